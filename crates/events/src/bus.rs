//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`RelayEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A job was assigned to a bot and pushed to the agent.
pub const JOB_DISPATCHED: &str = "job.dispatched";
/// The agent reported completion.
pub const JOB_COMPLETED: &str = "job.completed";
/// The agent reported failure.
pub const JOB_FAILED: &str = "job.failed";
/// The safety timeout released a silent bot.
pub const JOB_TIMED_OUT: &str = "job.timed_out";
/// An agent registered its bots.
pub const AGENT_REGISTERED: &str = "agent.registered";
/// An agent connection closed and the pool went offline.
pub const AGENT_DISCONNECTED: &str = "agent.disconnected";

// ---------------------------------------------------------------------------
// RelayEvent
// ---------------------------------------------------------------------------

/// Something that happened to the bot pool.
///
/// Constructed via [`RelayEvent::new`] and enriched with
/// [`with_worker`](RelayEvent::with_worker) and
/// [`with_payload`](RelayEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEvent {
    /// Dot-separated event name, e.g. `"job.dispatched"`.
    pub event_type: String,

    /// Bot the event concerns, if any.
    pub worker_id: Option<String>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl RelayEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            worker_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// ```rust
/// use botrelay_events::bus::{EventBus, RelayEvent, JOB_DISPATCHED};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(RelayEvent::new(JOB_DISPATCHED).with_worker("bot1"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<RelayEvent>,
}

impl EventBus {
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is subscribed.
    pub fn publish(&self, event: RelayEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
