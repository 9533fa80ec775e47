//! Least-recently-used bot selection.

use crate::registry::WorkerRecord;

/// Pick the idle worker that has waited longest since its last assignment.
///
/// Never-assigned workers sort before any assigned one. Equal timestamps fall
/// back to registry order (first match wins). `Busy` and `Offline` workers are
/// never candidates. Returns `None` when no worker is idle.
pub fn select_worker(workers: &[WorkerRecord]) -> Option<&WorkerRecord> {
    // `min_by_key` returns the first minimum, which gives the registry-order
    // tie-break. `None < Some(_)` puts never-assigned workers first.
    workers
        .iter()
        .filter(|w| w.is_idle())
        .min_by_key(|w| w.last_assigned_at)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::registry::{WorkerSpec, WorkerStatus};

    fn worker(
        id: &str,
        status: WorkerStatus,
        last: Option<chrono::DateTime<Utc>>,
    ) -> WorkerRecord {
        let mut w = WorkerRecord::new(WorkerSpec::new(id, id.to_uppercase()), status);
        w.last_assigned_at = last;
        w
    }

    #[test]
    fn empty_registry_selects_nothing() {
        assert!(select_worker(&[]).is_none());
    }

    #[test]
    fn no_idle_worker_selects_nothing() {
        let workers = vec![
            worker("bot1", WorkerStatus::Busy, None),
            worker("bot2", WorkerStatus::Offline, None),
        ];
        assert!(select_worker(&workers).is_none());
    }

    #[test]
    fn oldest_assignment_wins() {
        let t0 = Utc::now();
        let t1 = t0 - Duration::minutes(5);
        let workers = vec![
            worker("bot1", WorkerStatus::Idle, Some(t0)),
            worker("bot2", WorkerStatus::Idle, Some(t1)),
        ];
        assert_eq!(select_worker(&workers).unwrap().id, "bot2");
    }

    #[test]
    fn never_assigned_sorts_first() {
        let workers = vec![
            worker("bot1", WorkerStatus::Idle, Some(Utc::now() - Duration::days(30))),
            worker("bot2", WorkerStatus::Idle, None),
        ];
        assert_eq!(select_worker(&workers).unwrap().id, "bot2");
    }

    #[test]
    fn ties_break_by_registry_order() {
        let t = Utc::now();
        let workers = vec![
            worker("bot1", WorkerStatus::Idle, Some(t)),
            worker("bot2", WorkerStatus::Idle, Some(t)),
            worker("bot3", WorkerStatus::Idle, None),
            worker("bot4", WorkerStatus::Idle, None),
        ];
        assert_eq!(select_worker(&workers).unwrap().id, "bot3");

        let assigned_only = &workers[..2];
        assert_eq!(select_worker(assigned_only).unwrap().id, "bot1");
    }

    #[test]
    fn busy_and_offline_are_skipped_even_if_older() {
        let now = Utc::now();
        let workers = vec![
            worker("bot1", WorkerStatus::Busy, None),
            worker("bot2", WorkerStatus::Offline, Some(now - Duration::hours(1))),
            worker("bot3", WorkerStatus::Idle, Some(now)),
        ];
        assert_eq!(select_worker(&workers).unwrap().id, "bot3");
    }
}
