//! Job dispatcher: the single owner of all relay bookkeeping.
//!
//! [`Dispatcher`] holds the worker registry, the cooldown table and the
//! dispatch policy. Every method is synchronous and runs to completion, so a
//! caller that serialises access (one lock, one task) gets atomic
//! transitions for free. Time is passed in explicitly.

use std::time::Duration;

use uuid::Uuid;

use crate::cooldown::CooldownTable;
use crate::protocol::{JobAssignment, WorkerSnapshot};
use crate::registry::{WorkerRegistry, WorkerSpec, WorkerStatus};
use crate::request::JobRequest;
use crate::selection::select_worker;
use crate::types::{Timestamp, WorkerId};

/// Default safety timeout before a silent bot is released.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(180);

/// Default retry hint returned when the pool is at capacity.
pub const DEFAULT_BUSY_RETRY_AFTER: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Tunables for [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Per-requester minimum interval. `None` disables rate limiting.
    pub cooldown: Option<Duration>,
    /// When set, at most one job may be in flight across the whole pool.
    pub single_job: bool,
    /// Status every worker starts in.
    pub initial_status: WorkerStatus,
    /// Retry hint for [`DispatchError::CapacityExceeded`].
    pub busy_retry_after: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            cooldown: Some(crate::cooldown::DEFAULT_COOLDOWN),
            single_job: true,
            initial_status: WorkerStatus::Offline,
            busy_retry_after: DEFAULT_BUSY_RETRY_AFTER,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a bot request is refused. None of them mutate any state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Rate limited: wait {} before requesting again", wait_message(.retry_after))]
    RateLimited { retry_after: Duration },

    #[error("{}", busy_message(.busy_worker))]
    CapacityExceeded {
        busy_worker: Option<String>,
        retry_after: Duration,
    },

    #[error("No bots available")]
    NoWorkersAvailable { workers: Vec<WorkerSnapshot> },
}

fn wait_message(retry_after: &Duration) -> String {
    human_wait(*retry_after)
}

fn busy_message(busy_worker: &Option<String>) -> String {
    match busy_worker {
        Some(name) => format!("{name} is currently busy with another job"),
        None => "A job is already in progress".to_string(),
    }
}

/// Render a wait time as whole minutes (rounded up) or seconds.
pub fn human_wait(wait: Duration) -> String {
    let secs = wait.as_secs().max(1);
    if secs >= 60 {
        let minutes = secs.div_ceil(60);
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else if secs == 1 {
        "1 second".to_string()
    } else {
        format!("{secs} seconds")
    }
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

/// Why a busy bot is being handed back to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseReason {
    Completed,
    Failed(Option<String>),
    TimedOut,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseReason::Completed => "completed",
            ReleaseReason::Failed(_) => "failed",
            ReleaseReason::TimedOut => "timed_out",
        }
    }
}

/// Outcome of a successful [`Dispatcher::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub worker_id: WorkerId,
    pub worker_name: String,
    pub assignment_id: Uuid,
    pub reason: ReleaseReason,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Read-only view served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub is_processing: bool,
    pub workers: Vec<WorkerSnapshot>,
    pub last_assigned_worker_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    registry: WorkerRegistry,
    cooldowns: Option<CooldownTable>,
    policy: DispatchPolicy,
    last_assigned_name: Option<String>,
}

impl Dispatcher {
    pub fn new(workers: impl IntoIterator<Item = WorkerSpec>, policy: DispatchPolicy) -> Self {
        Self {
            registry: WorkerRegistry::new(workers, policy.initial_status),
            cooldowns: policy.cooldown.map(CooldownTable::new),
            policy,
            last_assigned_name: None,
        }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// True while any job is outstanding.
    ///
    /// Every release path (completion, failure, timeout, disconnect) returns
    /// the bot to a non-busy state, so this is exactly the processing flag.
    pub fn is_processing(&self) -> bool {
        self.registry.any_busy()
    }

    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        self.registry
            .records()
            .iter()
            .map(WorkerSnapshot::from)
            .collect()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            is_processing: self.is_processing(),
            workers: self.snapshot(),
            last_assigned_worker_name: self.last_assigned_name.clone(),
        }
    }

    /// Try to assign `request` to a bot.
    ///
    /// Checks run in order: requester cooldown, pool capacity (single-job
    /// mode), bot availability. A refusal leaves every piece of state
    /// untouched. On success the chosen bot is `Busy`, stamped with `now`,
    /// and the requester's cooldown starts.
    pub fn request_job(
        &mut self,
        request: &JobRequest,
        now: Timestamp,
    ) -> Result<JobAssignment, DispatchError> {
        if let Some(cooldowns) = self.cooldowns.as_mut() {
            if let Some(retry_after) = cooldowns.remaining(&request.requester, now) {
                return Err(DispatchError::RateLimited { retry_after });
            }
        }

        if self.policy.single_job {
            if let Some(busy) = self.registry.busy_worker() {
                return Err(DispatchError::CapacityExceeded {
                    busy_worker: Some(busy.display_name.clone()),
                    retry_after: self.policy.busy_retry_after,
                });
            }
        }

        let (bot_id, bot_name) = match select_worker(self.registry.records()) {
            Some(w) => (w.id.clone(), w.display_name.clone()),
            None => {
                return Err(DispatchError::NoWorkersAvailable {
                    workers: self.snapshot(),
                })
            }
        };

        let assignment_id = Uuid::new_v4();
        self.registry.mark_busy(&bot_id, assignment_id, now);
        if let Some(cooldowns) = self.cooldowns.as_mut() {
            cooldowns.record(&request.requester, now);
        }
        self.last_assigned_name = Some(bot_name.clone());

        Ok(JobAssignment {
            assignment_id,
            bot_id,
            bot_name,
            place_id: request.place_id.clone(),
            job_id: request.job_id.clone(),
            requester: request.requester.clone(),
            username: request.username.clone(),
        })
    }

    /// Hand a busy bot back to the pool.
    ///
    /// Idempotent: returns `None` without touching state when the bot is
    /// unknown or not `Busy`. When `expected` is given, the bot must still
    /// hold that assignment, so a stale timer cannot release a newer job.
    pub fn release(
        &mut self,
        worker_id: &str,
        expected: Option<Uuid>,
        reason: ReleaseReason,
    ) -> Option<Release> {
        let worker = self.registry.find_by_id(worker_id)?;
        if !worker.is_busy() {
            return None;
        }
        let assignment_id = worker.current_assignment?;
        if expected.is_some_and(|e| e != assignment_id) {
            return None;
        }
        let worker_name = worker.display_name.clone();

        self.registry.mark_idle(worker_id);

        Some(Release {
            worker_id: worker_id.to_string(),
            worker_name,
            assignment_id,
            reason,
        })
    }

    /// Agent registration: mark each known id online. Unknown ids are
    /// ignored. Returns how many ids matched a bot.
    pub fn register_workers<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        ids.iter()
            .filter(|id| self.registry.mark_online(id.as_ref()))
            .count()
    }

    /// Agent disconnect: every bot goes `Offline`, which also clears the
    /// processing flag. Returns the assignments that were in flight.
    pub fn disconnect_all(&mut self) -> Vec<Uuid> {
        let in_flight = self
            .registry
            .records()
            .iter()
            .filter_map(|w| w.current_assignment)
            .collect();
        self.registry.mark_all_offline();
        in_flight
    }

    /// Drop expired cooldown entries. Returns how many were removed.
    pub fn prune_cooldowns(&mut self, now: Timestamp) -> usize {
        self.cooldowns
            .as_mut()
            .map(|c| c.prune(now))
            .unwrap_or(0)
    }

    pub fn cooldown_entries(&self) -> usize {
        self.cooldowns.as_ref().map(CooldownTable::len).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
