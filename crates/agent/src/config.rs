use std::time::Duration;

/// Default simulated job duration when no command is configured.
const DEFAULT_JOB_DURATION_SECS: u64 = 5;

/// Default ceiling on a job command's run time.
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error)]
pub enum AgentConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Agent configuration loaded from environment variables.
///
/// | Variable                   | Required | Default | Description                              |
/// |----------------------------|----------|---------|------------------------------------------|
/// | `RELAY_WS_URL`             | yes      | --      | Push channel, e.g. `ws://host:3000/agent` |
/// | `BOT_IDS`                  | yes      | --      | Comma-separated bot ids this agent owns  |
/// | `JOB_COMMAND`              | no       | --      | Shell command run per job                |
/// | `JOB_DURATION_SECS`        | no       | `5`     | Simulated job length without a command   |
/// | `JOB_COMMAND_TIMEOUT_SECS` | no       | `120`   | Kill the command after this long         |
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub ws_url: String,
    pub bot_ids: Vec<String>,
    pub job_command: Option<String>,
    pub job_duration: Duration,
    pub command_timeout: Duration,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, AgentConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AgentConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ws_url = var("RELAY_WS_URL").ok_or(AgentConfigError::Missing("RELAY_WS_URL"))?;

        let bot_ids: Vec<String> = var("BOT_IDS")
            .ok_or(AgentConfigError::Missing("BOT_IDS"))?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if bot_ids.is_empty() {
            return Err(AgentConfigError::Missing("BOT_IDS"));
        }

        let job_duration = Duration::from_secs(secs(
            var("JOB_DURATION_SECS"),
            "JOB_DURATION_SECS",
            DEFAULT_JOB_DURATION_SECS,
        )?);
        let command_timeout = Duration::from_secs(secs(
            var("JOB_COMMAND_TIMEOUT_SECS"),
            "JOB_COMMAND_TIMEOUT_SECS",
            DEFAULT_COMMAND_TIMEOUT_SECS,
        )?);

        Ok(Self {
            ws_url,
            bot_ids,
            job_command: var("JOB_COMMAND"),
            job_duration,
            command_timeout,
        })
    }
}

fn secs(raw: Option<String>, var: &'static str, default: u64) -> Result<u64, AgentConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| AgentConfigError::Invalid {
            var,
            expected: "a whole number of seconds",
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AgentConfig, AgentConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = load(&[
            ("RELAY_WS_URL", "ws://localhost:3000/agent"),
            ("BOT_IDS", "bot1, bot2,,"),
        ])
        .unwrap();

        assert_eq!(config.bot_ids, vec!["bot1", "bot2"]);
        assert!(config.job_command.is_none());
        assert_eq!(config.job_duration, Duration::from_secs(5));
        assert_eq!(config.command_timeout, Duration::from_secs(120));
    }

    #[test]
    fn missing_url_is_reported() {
        let err = load(&[("BOT_IDS", "bot1")]).unwrap_err();
        assert_matches!(err, AgentConfigError::Missing("RELAY_WS_URL"));
    }

    #[test]
    fn empty_bot_list_is_reported() {
        let err = load(&[("RELAY_WS_URL", "ws://x"), ("BOT_IDS", " , ")]).unwrap_err();
        assert_matches!(err, AgentConfigError::Missing("BOT_IDS"));
    }

    #[test]
    fn invalid_duration_is_reported() {
        let err = load(&[
            ("RELAY_WS_URL", "ws://x"),
            ("BOT_IDS", "bot1"),
            ("JOB_DURATION_SECS", "soon"),
        ])
        .unwrap_err();
        assert_matches!(err, AgentConfigError::Invalid { var: "JOB_DURATION_SECS", .. });
    }
}
