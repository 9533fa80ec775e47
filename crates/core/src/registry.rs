//! In-memory worker registry.
//!
//! Holds the fixed pool of bots in configuration order. Registry order is
//! significant: it is the tie-breaker for the selection policy.

use serde::Serialize;
use uuid::Uuid;

use crate::types::{Timestamp, WorkerId};

// ---------------------------------------------------------------------------
// WorkerStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a single bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// No agent has registered this bot (or the agent disconnected).
    Offline,
    /// Registered and ready for a job.
    Idle,
    /// Executing a job.
    Busy,
}

impl WorkerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerStatus::Offline => "offline",
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
        }
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WorkerRecord
// ---------------------------------------------------------------------------

/// Static identity of a bot, as supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub id: WorkerId,
    pub display_name: String,
}

impl WorkerSpec {
    pub fn new(id: impl Into<WorkerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A bot and its current bookkeeping state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub display_name: String,
    pub status: WorkerStatus,
    /// Most recent assignment time; `None` means never assigned.
    pub last_assigned_at: Option<Timestamp>,
    /// Assignment currently held while `Busy`.
    pub current_assignment: Option<Uuid>,
}

impl WorkerRecord {
    pub fn new(spec: WorkerSpec, status: WorkerStatus) -> Self {
        Self {
            id: spec.id,
            display_name: spec.display_name,
            status,
            last_assigned_at: None,
            current_assignment: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == WorkerStatus::Idle
    }

    pub fn is_busy(&self) -> bool {
        self.status == WorkerStatus::Busy
    }
}

// ---------------------------------------------------------------------------
// WorkerRegistry
// ---------------------------------------------------------------------------

/// Ordered collection of [`WorkerRecord`]s keyed by id.
///
/// All status transitions on unknown ids are no-ops and report `false`.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    workers: Vec<WorkerRecord>,
}

impl WorkerRegistry {
    /// Build a registry from configuration. Duplicate ids keep their first
    /// occurrence.
    pub fn new(specs: impl IntoIterator<Item = WorkerSpec>, initial: WorkerStatus) -> Self {
        let mut workers: Vec<WorkerRecord> = Vec::new();
        for spec in specs {
            if workers.iter().any(|w| w.id == spec.id) {
                continue;
            }
            workers.push(WorkerRecord::new(spec, initial));
        }
        Self { workers }
    }

    /// Snapshot of every record in registry order.
    pub fn list_all(&self) -> Vec<WorkerRecord> {
        self.workers.clone()
    }

    /// Borrow the records without cloning.
    pub fn records(&self) -> &[WorkerRecord] {
        &self.workers
    }

    pub fn find_by_id(&self, id: &str) -> Option<&WorkerRecord> {
        self.workers.iter().find(|w| w.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut WorkerRecord> {
        self.workers.iter_mut().find(|w| w.id == id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// First record currently `Busy`, in registry order.
    pub fn busy_worker(&self) -> Option<&WorkerRecord> {
        self.workers.iter().find(|w| w.is_busy())
    }

    pub fn any_busy(&self) -> bool {
        self.busy_worker().is_some()
    }

    /// Registration: `Offline -> Idle`. A record that is already `Idle` or
    /// `Busy` keeps its state so a re-registering agent cannot orphan a job.
    pub fn mark_online(&mut self, id: &str) -> bool {
        match self.find_mut(id) {
            Some(w) => {
                if w.status == WorkerStatus::Offline {
                    w.status = WorkerStatus::Idle;
                }
                true
            }
            None => false,
        }
    }

    pub fn mark_offline(&mut self, id: &str) -> bool {
        match self.find_mut(id) {
            Some(w) => {
                w.status = WorkerStatus::Offline;
                w.current_assignment = None;
                true
            }
            None => false,
        }
    }

    /// Assignment: mark `Busy` and stamp the assignment time.
    pub fn mark_busy(&mut self, id: &str, assignment: Uuid, now: Timestamp) -> bool {
        match self.find_mut(id) {
            Some(w) => {
                w.status = WorkerStatus::Busy;
                w.last_assigned_at = Some(now);
                w.current_assignment = Some(assignment);
                true
            }
            None => false,
        }
    }

    pub fn mark_idle(&mut self, id: &str) -> bool {
        match self.find_mut(id) {
            Some(w) => {
                w.status = WorkerStatus::Idle;
                w.current_assignment = None;
                true
            }
            None => false,
        }
    }

    /// Channel-disconnect reconciliation: every record goes `Offline`.
    pub fn mark_all_offline(&mut self) {
        for w in &mut self.workers {
            w.status = WorkerStatus::Offline;
            w.current_assignment = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
