//! Push-channel infrastructure.
//!
//! Provides connection management, heartbeat monitoring, and the HTTP
//! upgrade handler agents and dashboards connect through.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::{ConnectionRole, WsManager};
