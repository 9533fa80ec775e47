use std::sync::Arc;

use crate::config::ServerConfig;
use crate::relay::Relay;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Owner of the bot pool and all dispatch bookkeeping.
    pub relay: Arc<Relay>,
    /// Push-channel connections (agents and dashboards).
    pub ws_manager: Arc<WsManager>,
    /// Relay lifecycle events (job log forwarding subscribes here).
    pub event_bus: Arc<botrelay_events::EventBus>,
}

impl AppState {
    /// Wire up a relay and its collaborators from configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        let ws_manager = Arc::new(WsManager::new());
        let event_bus = Arc::new(botrelay_events::EventBus::default());
        let dispatcher = botrelay_core::dispatcher::Dispatcher::new(
            config.bots.clone(),
            config.dispatch_policy(),
        );
        let relay = Relay::new(
            dispatcher,
            Arc::clone(&ws_manager),
            Arc::clone(&event_bus),
            config.job_timeout,
        );

        Self {
            config: Arc::new(config),
            relay,
            ws_manager,
            event_bus,
        }
    }
}
