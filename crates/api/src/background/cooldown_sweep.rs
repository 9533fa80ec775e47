//! Periodic eviction of expired requester cooldowns.
//!
//! Reads already evict stale entries; the sweep catches requesters that
//! never come back so the table stays bounded.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::relay::Relay;

/// How often the sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(relay: Arc<Relay>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Cooldown sweep started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cooldown sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                let removed = relay.prune_cooldowns().await;
                if removed > 0 {
                    tracing::debug!(removed, "Cooldown sweep: evicted expired entries");
                }
            }
        }
    }
}
