//! Per-requester rate limiting.
//!
//! [`CooldownTable`] remembers when each requester last had a request
//! accepted. Entries older than the window are evicted when read and by
//! [`CooldownTable::prune`], so the table only holds live cooldowns.

use std::collections::HashMap;
use std::time::Duration;

use crate::types::Timestamp;

/// Default minimum interval between accepted requests from one requester.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CooldownTable {
    window: chrono::Duration,
    last_accepted: HashMap<String, Timestamp>,
}

impl CooldownTable {
    pub fn new(window: Duration) -> Self {
        Self {
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            last_accepted: HashMap::new(),
        }
    }

    /// Time left before `requester` may be accepted again, or `None` if it
    /// may be accepted now. An expired entry is removed.
    pub fn remaining(&mut self, requester: &str, now: Timestamp) -> Option<Duration> {
        let last = *self.last_accepted.get(requester)?;
        let elapsed = now.signed_duration_since(last);
        if elapsed >= self.window {
            self.last_accepted.remove(requester);
            return None;
        }
        self.window
            .checked_sub(&elapsed)
            .and_then(|left| left.to_std().ok())
    }

    /// Record an accepted request, overwriting any previous entry.
    pub fn record(&mut self, requester: &str, now: Timestamp) {
        self.last_accepted.insert(requester.to_string(), now);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn prune(&mut self, now: Timestamp) -> usize {
        let before = self.last_accepted.len();
        let window = self.window;
        self.last_accepted
            .retain(|_, last| now.signed_duration_since(*last) < window);
        before - self.last_accepted.len()
    }

    pub fn len(&self) -> usize {
        self.last_accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_accepted.is_empty()
    }
}

impl Default for CooldownTable {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
