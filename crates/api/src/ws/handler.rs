use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use botrelay_core::protocol::{AgentMessage, ServerMessage};
use futures::{SinkExt, StreamExt};

use crate::relay::Relay;
use crate::state::AppState;
use crate::ws::manager::{frame, ConnectionRole, WsManager};

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` as an
/// observer; it becomes an agent connection once it sends `register-bots`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager, state.relay))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection and greets it with a status snapshot.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Dispatches inbound agent events on the current task.
///   4. On close, reconciles the pool if the peer was an agent.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>, relay: Arc<Relay>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone()).await;

    let snapshot = relay.status().await.workers;
    ws_manager
        .send_to(&conn_id, frame(&ServerMessage::StatusUpdate(snapshot)))
        .await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_text(&conn_id, text.as_str(), &ws_manager, &relay).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    let role = ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, ?role, "WebSocket disconnected");

    if role == Some(ConnectionRole::Agent) {
        relay.agent_disconnected().await;
    }
}

/// Parse and dispatch one inbound text frame.
async fn handle_text(conn_id: &str, text: &str, ws_manager: &WsManager, relay: &Relay) {
    let message = match serde_json::from_str::<AgentMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(conn_id, error = %e, raw = %text, "Unknown or malformed push-channel frame");
            return;
        }
    };
    tracing::debug!(conn_id, event = message.event_name(), "Push-channel event received");

    match message {
        AgentMessage::RegisterBots(ids) => {
            ws_manager.promote_to_agent(conn_id).await;
            relay.register(&ids).await;
        }
        AgentMessage::TaskComplete(done) => {
            relay.complete(&done.bot_id, done.assignment_id).await;
        }
        AgentMessage::TaskFailed(failed) => {
            relay
                .fail(&failed.bot_id, failed.assignment_id, failed.error)
                .await;
        }
    }
}
