//! Unit tests for `WsManager`.
//!
//! These tests exercise the push-channel connection manager directly,
//! without performing any HTTP upgrades. They verify add/remove semantics,
//! role-filtered delivery, and graceful shutdown behaviour.

use axum::extract::ws::Message;
use botrelay_api::ws::{ConnectionRole, WsManager};

fn text(body: &str) -> Message {
    Message::Text(body.to_string().into())
}

// ---------------------------------------------------------------------------
// Test: new manager starts with zero connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_manager_has_zero_connections() {
    let manager = WsManager::new();

    assert_eq!(manager.connection_count().await, 0);
    assert_eq!(manager.agent_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: add() registers an observer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_registers_observer() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string()).await;

    assert_eq!(manager.connection_count().await, 1);
    assert_eq!(manager.agent_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: remove() reports the role the connection had
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_returns_role() {
    let manager = WsManager::new();

    let _a = manager.add("agent".to_string()).await;
    let _o = manager.add("observer".to_string()).await;
    assert!(manager.promote_to_agent("agent").await);

    assert_eq!(manager.remove("agent").await, Some(ConnectionRole::Agent));
    assert_eq!(manager.remove("observer").await, Some(ConnectionRole::Observer));
    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: remove() with unknown ID is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_unknown_id_is_noop() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string()).await;

    assert_eq!(manager.remove("nonexistent").await, None);
    assert_eq!(manager.connection_count().await, 1);
}

#[tokio::test]
async fn promote_unknown_id_returns_false() {
    let manager = WsManager::new();

    assert!(!manager.promote_to_agent("ghost").await);
}

// ---------------------------------------------------------------------------
// Test: broadcast reaches everyone, send_to_agents only agents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_all_connections() {
    let manager = WsManager::new();

    let mut agent = manager.add("agent".to_string()).await;
    let mut observer = manager.add("observer".to_string()).await;
    manager.promote_to_agent("agent").await;

    assert_eq!(manager.broadcast(text("hello")).await, 2);

    assert_eq!(agent.try_recv().unwrap(), text("hello"));
    assert_eq!(observer.try_recv().unwrap(), text("hello"));
}

#[tokio::test]
async fn send_to_agents_skips_observers() {
    let manager = WsManager::new();

    let mut agent = manager.add("agent".to_string()).await;
    let mut observer = manager.add("observer".to_string()).await;
    manager.promote_to_agent("agent").await;

    assert_eq!(manager.send_to_agents(text("job")).await, 1);

    assert_eq!(agent.try_recv().unwrap(), text("job"));
    assert!(observer.try_recv().is_err());
}

#[tokio::test]
async fn send_to_agents_without_agents_delivers_nothing() {
    let manager = WsManager::new();
    let _observer = manager.add("observer".to_string()).await;

    assert_eq!(manager.send_to_agents(text("job")).await, 0);
}

// ---------------------------------------------------------------------------
// Test: a dropped receiver does not break delivery to others
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closed_channel_is_skipped() {
    let manager = WsManager::new();

    let dead = manager.add("dead".to_string()).await;
    let mut live = manager.add("live".to_string()).await;
    drop(dead);

    assert_eq!(manager.broadcast(text("status")).await, 1);
    assert_eq!(live.try_recv().unwrap(), text("status"));
    assert!(!manager.send_to("dead", text("x")).await);
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close and clears all connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);
    assert!(matches!(rx1.recv().await, Some(Message::Close(None))));
    assert!(matches!(rx2.recv().await, Some(Message::Close(None))));
}

// ---------------------------------------------------------------------------
// Test: ping_all() sends a Ping frame
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_all_sends_ping() {
    let manager = WsManager::new();

    let mut rx = manager.add("conn-1".to_string()).await;
    manager.ping_all().await;

    assert!(matches!(rx.recv().await, Some(Message::Ping(_))));
}
