//! Job log forwarding service.
//!
//! [`JobLogForwarder`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and posts a `PENDING` row to the external job log for every
//! `job.dispatched` event. Each delivery runs on its own task so a slow log
//! endpoint never delays the next one; failures are logged and dropped.

use std::sync::Arc;

use botrelay_core::protocol::JobAssignment;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::bus::{RelayEvent, JOB_DISPATCHED};
use crate::delivery::webhook::{JobLogEntry, WebhookDelivery};

pub struct JobLogForwarder {
    url: String,
    delivery: Arc<WebhookDelivery>,
    in_flight: TaskTracker,
}

impl JobLogForwarder {
    pub fn new(url: impl Into<String>, delivery: WebhookDelivery) -> Self {
        Self {
            url: url.into(),
            delivery: Arc::new(delivery),
            in_flight: TaskTracker::new(),
        }
    }

    /// Run the forwarding loop until `cancel` fires or the bus is dropped,
    /// then wait for in-flight deliveries to finish.
    ///
    /// Jobs already queued on the receiver when `cancel` fires are still
    /// logged.
    pub async fn run(self, mut receiver: broadcast::Receiver<RelayEvent>, cancel: CancellationToken) {
        tracing::info!(url = %self.url, "Job log forwarder started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Job log forwarder cancelled, draining");
                    self.drain_queued(&mut receiver);
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => self.handle(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Job log forwarder lagged, some jobs were not logged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, job log forwarder draining");
                        break;
                    }
                },
            }
        }

        self.in_flight.close();
        self.in_flight.wait().await;
        tracing::info!("Job log forwarder stopped");
    }

    fn drain_queued(&self, receiver: &mut broadcast::Receiver<RelayEvent>) {
        loop {
            match receiver.try_recv() {
                Ok(event) => self.handle(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Job log forwarder lagged, some jobs were not logged");
                }
                Err(_) => break,
            }
        }
    }

    fn handle(&self, event: RelayEvent) {
        if event.event_type == JOB_DISPATCHED {
            self.forward(event);
        }
    }

    fn forward(&self, event: RelayEvent) {
        let assignment: JobAssignment = match serde_json::from_value(event.payload) {
            Ok(a) => a,
            Err(e) => {
                tracing::error!(error = %e, "Malformed job.dispatched payload, not logged");
                return;
            }
        };
        let entry = JobLogEntry::pending(&assignment, event.timestamp);

        let url = self.url.clone();
        let delivery = Arc::clone(&self.delivery);
        self.in_flight.spawn(async move {
            match delivery.deliver(&url, &entry).await {
                Ok(()) => tracing::debug!(
                    job_id = %entry.job_id,
                    bot = %entry.bot_name,
                    "Job logged"
                ),
                Err(e) => tracing::error!(
                    job_id = %entry.job_id,
                    requester = %entry.requester,
                    error = %e,
                    "Job log delivery failed"
                ),
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
