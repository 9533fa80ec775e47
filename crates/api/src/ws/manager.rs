use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use botrelay_core::protocol::ServerMessage;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// What is on the other end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Read-only listener (dashboards). Every connection starts here.
    Observer,
    /// An agent process that has sent `register-bots`.
    Agent,
}

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    pub role: ConnectionRole,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
}

/// Manages all active push-channel connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Sends never block: each connection has an
/// unbounded queue drained by its own writer task.
pub struct WsManager {
    pub(crate) connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection as an [`ConnectionRole::Observer`].
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            role: ConnectionRole::Observer,
            sender: tx,
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection, returning the role it had.
    pub async fn remove(&self, conn_id: &str) -> Option<ConnectionRole> {
        self.connections
            .write()
            .await
            .remove(conn_id)
            .map(|conn| conn.role)
    }

    /// Mark a connection as an agent. Returns `false` if it is unknown.
    pub async fn promote_to_agent(&self, conn_id: &str) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.role = ConnectionRole::Agent;
                true
            }
            None => false,
        }
    }

    /// Broadcast a message to every connection.
    ///
    /// Returns how many connections accepted it. Connections whose channels
    /// are closed are skipped; they are cleaned up by their own receive loop.
    pub async fn broadcast(&self, message: Message) -> usize {
        self.send_where(message, |_| true).await
    }

    /// Send a message to agent connections only.
    pub async fn send_to_agents(&self, message: Message) -> usize {
        self.send_where(message, |conn| conn.role == ConnectionRole::Agent)
            .await
    }

    /// Send a message to a single connection.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.sender.send(message).is_ok())
    }

    async fn send_where<F>(&self, message: Message, filter: F) -> usize
    where
        F: Fn(&WsConnection) -> bool,
    {
        let conns = self.connections.read().await;
        let mut delivered = 0;
        let mut failed = 0;
        for conn in conns.values().filter(|c| filter(c)) {
            if conn.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                failed += 1;
            }
        }
        if failed > 0 {
            tracing::warn!(failed, delivered, "Push to closed WebSocket channels dropped");
        }
        delivered
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn agent_count(&self) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.role == ConnectionRole::Agent)
            .count()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connection. Used by the heartbeat task.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a relay event as a WebSocket text frame.
pub fn frame(message: &ServerMessage) -> Message {
    Message::Text(message.to_json().into())
}
