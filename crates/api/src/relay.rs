//! Relay service: the async shell around the [`Dispatcher`].
//!
//! All bookkeeping lives in one [`Dispatcher`] behind one lock. Each entry
//! point (HTTP request, agent event, timer expiry, disconnect) takes the
//! lock, performs a synchronous transition, releases it, and only then
//! talks to the push channel or the event bus. No handler awaits while
//! holding the lock, so every transition is atomic with respect to the
//! others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use botrelay_core::dispatcher::{
    DispatchError, Dispatcher, Release, ReleaseReason, StatusReport,
};
use botrelay_core::protocol::{JobAssignment, ServerMessage};
use botrelay_core::request::JobRequest;
use botrelay_events::bus::{
    AGENT_DISCONNECTED, AGENT_REGISTERED, JOB_COMPLETED, JOB_DISPATCHED, JOB_FAILED,
    JOB_TIMED_OUT,
};
use botrelay_events::{EventBus, RelayEvent};
use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ws::manager::{frame, WsManager};

struct RelayState {
    dispatcher: Dispatcher,
    /// Safety timers for in-flight assignments.
    timers: HashMap<Uuid, CancellationToken>,
}

pub struct Relay {
    state: Mutex<RelayState>,
    ws_manager: Arc<WsManager>,
    event_bus: Arc<EventBus>,
    job_timeout: Duration,
}

impl Relay {
    pub fn new(
        dispatcher: Dispatcher,
        ws_manager: Arc<WsManager>,
        event_bus: Arc<EventBus>,
        job_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RelayState {
                dispatcher,
                timers: HashMap::new(),
            }),
            ws_manager,
            event_bus,
            job_timeout,
        })
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Assign a job to a bot, push it to the agent, and arm the safety
    /// timeout. Returns as soon as the push is queued; completion is reported
    /// later through [`Relay::complete`] or [`Relay::fail`].
    pub async fn request_job(
        self: &Arc<Self>,
        request: &JobRequest,
    ) -> Result<JobAssignment, DispatchError> {
        let (assignment, timer) = {
            let mut state = self.state.lock().await;
            let assignment = state.dispatcher.request_job(request, Utc::now())?;
            let timer = CancellationToken::new();
            state.timers.insert(assignment.assignment_id, timer.clone());
            (assignment, timer)
        };

        // The bot is Busy from here on. Arm its timer and publish before the
        // first await so a caller that drops this future mid-push cannot leave
        // the bot Busy with nothing to release it.
        self.arm_timeout(assignment.bot_id.clone(), assignment.assignment_id, timer);

        match serde_json::to_value(&assignment) {
            Ok(payload) => self.event_bus.publish(
                RelayEvent::new(JOB_DISPATCHED)
                    .with_worker(assignment.bot_id.clone())
                    .with_payload(payload),
            ),
            Err(e) => tracing::error!(error = %e, "Failed to encode job.dispatched payload"),
        }

        tracing::info!(
            assignment_id = %assignment.assignment_id,
            bot_id = %assignment.bot_id,
            place_id = %assignment.place_id,
            job_id = %assignment.job_id,
            requester = %assignment.requester,
            "Job dispatched",
        );

        let delivered = self
            .ws_manager
            .send_to_agents(frame(&ServerMessage::BotJob(assignment.clone())))
            .await;
        if delivered == 0 {
            tracing::warn!(
                bot_id = %assignment.bot_id,
                "No agent connection received the job; the safety timeout will release the bot",
            );
        }
        self.broadcast_status().await;

        Ok(assignment)
    }

    fn arm_timeout(self: &Arc<Self>, worker_id: String, assignment_id: Uuid, timer: CancellationToken) {
        let relay = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {
                    tracing::trace!(%assignment_id, "Safety timeout cancelled");
                }
                _ = tokio::time::sleep(relay.job_timeout) => {
                    relay.expire(&worker_id, assignment_id).await;
                }
            }
        });
    }

    /// Timer expiry: release the bot only if it still holds this assignment.
    async fn expire(&self, worker_id: &str, assignment_id: Uuid) {
        let released = {
            let mut state = self.state.lock().await;
            state.timers.remove(&assignment_id);
            state
                .dispatcher
                .release(worker_id, Some(assignment_id), ReleaseReason::TimedOut)
        };

        let Some(release) = released else {
            tracing::debug!(worker_id, %assignment_id, "Safety timeout fired for settled job");
            return;
        };

        tracing::warn!(
            worker_id,
            %assignment_id,
            timeout_secs = self.job_timeout.as_secs(),
            "No callback from agent, releasing bot",
        );
        self.ws_manager
            .broadcast(frame(&ServerMessage::BotTimeout(release.worker_id.clone())))
            .await;
        self.broadcast_status().await;
        self.publish_release(JOB_TIMED_OUT, &release);
    }

    // -----------------------------------------------------------------------
    // Agent events
    // -----------------------------------------------------------------------

    /// `task-complete`: release the bot and cancel its timer. When the agent
    /// echoes an assignment id, only that assignment is settled.
    pub async fn complete(&self, worker_id: &str, assignment_id: Option<Uuid>) -> bool {
        self.settle(worker_id, assignment_id, ReleaseReason::Completed)
            .await
    }

    /// `task-failed`: release the bot, cancel its timer and log the reason.
    pub async fn fail(
        &self,
        worker_id: &str,
        assignment_id: Option<Uuid>,
        error: Option<String>,
    ) -> bool {
        self.settle(worker_id, assignment_id, ReleaseReason::Failed(error))
            .await
    }

    async fn settle(
        &self,
        worker_id: &str,
        assignment_id: Option<Uuid>,
        reason: ReleaseReason,
    ) -> bool {
        let released = {
            let mut state = self.state.lock().await;
            let released = state
                .dispatcher
                .release(worker_id, assignment_id, reason.clone());
            if let Some(release) = &released {
                if let Some(timer) = state.timers.remove(&release.assignment_id) {
                    timer.cancel();
                }
            }
            released
        };

        let Some(release) = released else {
            tracing::debug!(
                worker_id,
                assignment_id = ?assignment_id,
                reason = reason.as_str(),
                "Ignoring callback for a bot that is not busy with this assignment",
            );
            return false;
        };

        let event_type = match &release.reason {
            ReleaseReason::Failed(error) => {
                tracing::warn!(
                    worker_id,
                    assignment_id = %release.assignment_id,
                    error = error.as_deref().unwrap_or("unspecified"),
                    "Agent reported job failure",
                );
                JOB_FAILED
            }
            _ => {
                tracing::info!(
                    worker_id,
                    assignment_id = %release.assignment_id,
                    "Agent reported job complete",
                );
                JOB_COMPLETED
            }
        };

        self.ws_manager
            .broadcast(frame(&ServerMessage::BotFreed(release.worker_id.clone())))
            .await;
        self.broadcast_status().await;
        self.publish_release(event_type, &release);
        true
    }

    /// `register-bots`: bring the listed bots online. Returns how many ids
    /// matched a configured bot.
    pub async fn register(&self, ids: &[String]) -> usize {
        let matched = self.state.lock().await.dispatcher.register_workers(ids);

        if matched < ids.len() {
            tracing::warn!(
                registered = matched,
                requested = ids.len(),
                "Agent registered unknown bot ids",
            );
        }
        tracing::info!(registered = matched, "Agent registered bots");

        self.broadcast_status().await;
        self.event_bus.publish(
            RelayEvent::new(AGENT_REGISTERED).with_payload(serde_json::json!({ "bots": ids })),
        );
        matched
    }

    /// Agent connection closed: every bot goes offline and every pending
    /// safety timer is cancelled.
    pub async fn agent_disconnected(&self) {
        let in_flight = {
            let mut state = self.state.lock().await;
            let in_flight = state.dispatcher.disconnect_all();
            for (_, timer) in state.timers.drain() {
                timer.cancel();
            }
            in_flight
        };

        tracing::warn!(
            abandoned_jobs = in_flight.len(),
            "Agent disconnected, all bots marked offline",
        );
        self.broadcast_status().await;
        self.event_bus.publish(
            RelayEvent::new(AGENT_DISCONNECTED)
                .with_payload(serde_json::json!({ "abandonedAssignments": in_flight })),
        );
    }

    // -----------------------------------------------------------------------
    // Views / maintenance
    // -----------------------------------------------------------------------

    pub async fn status(&self) -> StatusReport {
        self.state.lock().await.dispatcher.status()
    }

    /// Push the current worker snapshot to every connection.
    pub async fn broadcast_status(&self) {
        let snapshot = self.state.lock().await.dispatcher.snapshot();
        self.ws_manager
            .broadcast(frame(&ServerMessage::StatusUpdate(snapshot)))
            .await;
    }

    /// Drop expired cooldown entries.
    pub async fn prune_cooldowns(&self) -> usize {
        self.state
            .lock()
            .await
            .dispatcher
            .prune_cooldowns(Utc::now())
    }

    pub async fn pending_timers(&self) -> usize {
        self.state.lock().await.timers.len()
    }

    /// Cancel every safety timer. Used during shutdown.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let count = state.timers.len();
        for (_, timer) in state.timers.drain() {
            timer.cancel();
        }
        tracing::info!(count, "Cancelled pending safety timers");
    }

    fn publish_release(&self, event_type: &str, release: &Release) {
        let error = match &release.reason {
            ReleaseReason::Failed(error) => error.clone(),
            _ => None,
        };
        self.event_bus.publish(
            RelayEvent::new(event_type)
                .with_worker(release.worker_id.clone())
                .with_payload(serde_json::json!({
                    "assignmentId": release.assignment_id,
                    "botName": release.worker_name,
                    "reason": release.reason.as_str(),
                    "error": error,
                })),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
