//! Job log webhook delivery.
//!
//! [`WebhookDelivery`] posts a JSON [`JobLogEntry`] to the external job log
//! (a spreadsheet script endpoint in production). Failed attempts are
//! retried with a short backoff; the final outcome is returned to the caller
//! so it can be logged. The response body is never inspected.

use std::time::Duration;

use botrelay_core::protocol::JobAssignment;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Default retry delays (exponential backoff: 1s, 2s, 4s).
const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Status recorded for a freshly dispatched job.
pub const STATUS_PENDING: &str = "PENDING";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// JobLogEntry
// ---------------------------------------------------------------------------

/// One row in the external job log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogEntry {
    /// RFC 3339 with millisecond precision, e.g. `2026-10-15T09:30:00.000Z`.
    pub timestamp: String,
    pub place_id: String,
    pub job_id: String,
    pub requester: String,
    pub username: Option<String>,
    pub status: String,
    pub bot_name: String,
}

impl JobLogEntry {
    pub fn pending(assignment: &JobAssignment, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            place_id: assignment.place_id.clone(),
            job_id: assignment.job_id.clone(),
            requester: assignment.requester.clone(),
            username: assignment.username.clone(),
            status: STATUS_PENDING.to_string(),
            bot_name: assignment.bot_name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

pub struct WebhookDelivery {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl WebhookDelivery {
    pub fn new() -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
        })
    }

    /// Replace the backoff schedule. An empty schedule means a single attempt.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Post `entry` to `url`, retrying per the backoff schedule.
    ///
    /// Returns `Ok(())` on the first 2xx response, otherwise the error from
    /// the final attempt.
    pub async fn deliver(&self, url: &str, entry: &JobLogEntry) -> Result<(), WebhookError> {
        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(url, entry).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        error = %e,
                        "Job log delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        self.try_send(url, entry).await
    }

    async fn try_send(&self, url: &str, entry: &JobLogEntry) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(entry).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
