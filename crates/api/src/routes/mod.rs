pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{bot_request, status};
use crate::state::AppState;
use crate::ws;

/// Build the relay route tree.
///
/// ```text
/// POST /request-bot      assign a bot to a game session
/// GET  /status           pool status snapshot
/// GET  /agent            push channel (WebSocket upgrade)
/// GET  /ws               alias of /agent for dashboards
/// ```
pub fn relay_routes() -> Router<AppState> {
    Router::new()
        .route("/request-bot", post(bot_request::request_bot))
        .route("/status", get(status::status))
        .route("/agent", get(ws::ws_handler))
        .route("/ws", get(ws::ws_handler))
}
