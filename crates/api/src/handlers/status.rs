//! Read-only liveness and pool status.

use axum::extract::State;
use axum::Json;
use botrelay_core::protocol::WorkerSnapshot;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub online: bool,
    pub is_processing: bool,
    pub bots: Vec<WorkerSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_bot: Option<String>,
    pub agents_connected: usize,
}

/// GET /status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let report = state.relay.status().await;
    let agents_connected = state.ws_manager.agent_count().await;

    Json(StatusResponse {
        online: true,
        is_processing: report.is_processing,
        bots: report.workers,
        last_bot: report.last_assigned_worker_name,
        agents_connected,
    })
}

/// GET /ping -- plain-text liveness probe.
pub async fn ping() -> &'static str {
    "OK"
}
