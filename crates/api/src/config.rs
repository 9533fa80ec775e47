use std::time::Duration;

use botrelay_core::dispatcher::{DispatchPolicy, DEFAULT_BUSY_RETRY_AFTER, DEFAULT_JOB_TIMEOUT};
use botrelay_core::registry::{WorkerSpec, WorkerStatus};

/// Bot pool used when `BOTS` is not set.
const DEFAULT_BOTS: &str = "bot1:Bot 1,bot2:Bot 2,bot3:Bot 3";

/// Invalid environment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("BOTS must list at least one bot")]
    EmptyPool,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins. A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Budget for draining background tasks on shutdown (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// External job log endpoint. `None` disables job logging.
    pub log_webhook_url: Option<String>,
    /// The bot pool, in selection tie-break order.
    pub bots: Vec<WorkerSpec>,
    /// Start bots `Idle` instead of waiting for agent registration.
    pub workers_start_online: bool,
    /// Cap the whole pool to one job in flight.
    pub single_job_mode: bool,
    /// Per-requester cooldown. `None` disables it.
    pub cooldown: Option<Duration>,
    /// Safety timeout before a silent bot is released.
    pub job_timeout: Duration,
    /// ETA quoted to callers on success.
    pub job_eta: Duration,
    /// Retry hint returned when the pool is busy.
    pub busy_retry_after: Duration,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                 | Default                              |
    /// |-------------------------|--------------------------------------|
    /// | `HOST`                  | `0.0.0.0`                            |
    /// | `PORT`                  | `3000`                               |
    /// | `CORS_ORIGINS`          | `*`                                  |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                                 |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `10`                                 |
    /// | `LOG_WEBHOOK_URL`       | unset (alias `GOOGLE_SCRIPT_URL`)    |
    /// | `BOTS`                  | `bot1:Bot 1,bot2:Bot 2,bot3:Bot 3`   |
    /// | `WORKERS_START_ONLINE`  | `false`                              |
    /// | `SINGLE_JOB_MODE`       | `true`                               |
    /// | `COOLDOWN_SECS`         | `300` (`0` disables)                 |
    /// | `JOB_TIMEOUT_SECS`      | `180`                                |
    /// | `JOB_ETA_SECS`          | `60`                                 |
    /// | `BUSY_RETRY_AFTER_SECS` | `30`                                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(var("PORT"), "PORT", "a valid u16", 3000u16)?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs =
            parse_or(var("REQUEST_TIMEOUT_SECS"), "REQUEST_TIMEOUT_SECS", "a valid u64", 30)?;
        let shutdown_timeout_secs =
            parse_or(var("SHUTDOWN_TIMEOUT_SECS"), "SHUTDOWN_TIMEOUT_SECS", "a valid u64", 10)?;

        let log_webhook_url = var("LOG_WEBHOOK_URL").or_else(|| var("GOOGLE_SCRIPT_URL"));

        let bots = parse_bots(&var("BOTS").unwrap_or_else(|| DEFAULT_BOTS.into()))?;

        let workers_start_online = parse_bool(var("WORKERS_START_ONLINE"), "WORKERS_START_ONLINE", false)?;
        let single_job_mode = parse_bool(var("SINGLE_JOB_MODE"), "SINGLE_JOB_MODE", true)?;

        let cooldown_secs: u64 = parse_or(var("COOLDOWN_SECS"), "COOLDOWN_SECS", "a valid u64", 300)?;
        let cooldown = (cooldown_secs > 0).then(|| Duration::from_secs(cooldown_secs));

        let job_timeout = Duration::from_secs(parse_or(
            var("JOB_TIMEOUT_SECS"),
            "JOB_TIMEOUT_SECS",
            "a valid u64",
            DEFAULT_JOB_TIMEOUT.as_secs(),
        )?);
        let job_eta = Duration::from_secs(parse_or(
            var("JOB_ETA_SECS"),
            "JOB_ETA_SECS",
            "a valid u64",
            60,
        )?);
        let busy_retry_after = Duration::from_secs(parse_or(
            var("BUSY_RETRY_AFTER_SECS"),
            "BUSY_RETRY_AFTER_SECS",
            "a valid u64",
            DEFAULT_BUSY_RETRY_AFTER.as_secs(),
        )?);

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            log_webhook_url,
            bots,
            workers_start_online,
            single_job_mode,
            cooldown,
            job_timeout,
            job_eta,
            busy_retry_after,
        })
    }

    /// Dispatcher tunables derived from this configuration.
    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            cooldown: self.cooldown,
            single_job: self.single_job_mode,
            initial_status: if self.workers_start_online {
                WorkerStatus::Idle
            } else {
                WorkerStatus::Offline
            },
            busy_retry_after: self.busy_retry_after,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        }),
    }
}

fn parse_bool(raw: Option<String>, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(value) => Err(ConfigError::Invalid {
            var,
            expected: "a boolean",
            value,
        }),
    }
}

/// Parse `id:Display Name` pairs separated by commas. A bare `id` uses the
/// id as its display name.
fn parse_bots(raw: &str) -> Result<Vec<WorkerSpec>, ConfigError> {
    let mut bots = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, name) = match entry.split_once(':') {
            Some((id, name)) => (id.trim(), name.trim()),
            None => (entry, entry),
        };
        if id.is_empty() {
            return Err(ConfigError::Invalid {
                var: "BOTS",
                expected: "a list of id:name pairs",
                value: raw.to_string(),
            });
        }
        let name = if name.is_empty() { id } else { name };
        bots.push(WorkerSpec::new(id, name));
    }
    if bots.is_empty() {
        return Err(ConfigError::EmptyPool);
    }
    Ok(bots)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
