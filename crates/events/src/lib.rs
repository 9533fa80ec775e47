//! Relay event bus and outbound job log delivery.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`RelayEvent`]: the lifecycle event envelope (dispatched, completed,
//!   failed, timed out, agent connected/disconnected).
//! - [`delivery`]: the webhook client for the external job log.
//! - [`JobLogForwarder`]: background service that posts every dispatched
//!   job to the job log.

pub mod bus;
pub mod delivery;
pub mod forwarder;

pub use bus::{EventBus, RelayEvent};
pub use delivery::webhook::{JobLogEntry, WebhookDelivery, WebhookError};
pub use forwarder::JobLogForwarder;
