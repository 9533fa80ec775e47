//! Job execution.
//!
//! Runs the configured `JOB_COMMAND` through `sh -c` with the job's fields
//! exported as environment variables, or simulates a job of fixed length
//! when no command is configured. The outcome is reported back to the relay
//! as `task-complete` or `task-failed`.

use std::time::{Duration, Instant};

use botrelay_core::protocol::JobAssignment;
use tokio::process::Command;

/// How a job is carried out.
#[derive(Debug, Clone)]
pub enum JobRunner {
    /// Run a shell command per job.
    Command { command: String, timeout: Duration },
    /// Sleep for a fixed time and report success.
    Simulated { duration: Duration },
}

/// Why a job did not complete.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("failed to start job command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("job command exited with status {}: {stderr}", exit_code(.code))]
    Exit { code: Option<i32>, stderr: String },

    #[error("job command timed out after {0}s")]
    TimedOut(u64),
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

impl JobRunner {
    pub fn new(command: Option<String>, timeout: Duration, duration: Duration) -> Self {
        match command {
            Some(command) => JobRunner::Command { command, timeout },
            None => JobRunner::Simulated { duration },
        }
    }

    /// Execute one job to completion.
    pub async fn run(&self, job: &JobAssignment) -> Result<(), JobError> {
        let start = Instant::now();

        let result = match self {
            JobRunner::Simulated { duration } => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
            JobRunner::Command { command, timeout } => run_command(command, *timeout, job).await,
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => {
                tracing::info!(bot_id = %job.bot_id, job_id = %job.job_id, elapsed_ms, "Job finished");
            }
            Err(e) => {
                tracing::error!(
                    bot_id = %job.bot_id,
                    job_id = %job.job_id,
                    elapsed_ms,
                    error = %e,
                    "Job failed",
                );
            }
        }
        result
    }
}

async fn run_command(command: &str, timeout: Duration, job: &JobAssignment) -> Result<(), JobError> {
    tracing::info!(bot_id = %job.bot_id, place_id = %job.place_id, "Executing job command");

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env("BOT_ID", &job.bot_id)
        .env("BOT_NAME", &job.bot_name)
        .env("PLACE_ID", &job.place_id)
        .env("JOB_ID", &job.job_id)
        .env("REQUESTER", &job.requester)
        .env("USERNAME", job.username.as_deref().unwrap_or_default())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, output).await {
        Ok(output) => output?,
        Err(_) => return Err(JobError::TimedOut(timeout.as_secs())),
    };

    if output.status.success() {
        Ok(())
    } else {
        Err(JobError::Exit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
