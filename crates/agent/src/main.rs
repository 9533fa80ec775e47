//! `botrelay-agent` -- reference agent for the bot relay.
//!
//! Connects to the relay's push channel, registers the bots it drives, and
//! runs each assigned job through `JOB_COMMAND` (or a timed simulation),
//! reporting `task-complete` or `task-failed` when it finishes. See
//! [`AgentConfig`] for the environment variables.

use botrelay_agent::config::AgentConfig;
use botrelay_agent::session;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "botrelay_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid agent configuration");
        std::process::exit(1);
    });

    tracing::info!(
        ws_url = %config.ws_url,
        bots = ?config.bot_ids,
        command = config.job_command.as_deref().unwrap_or("<simulated>"),
        "Starting botrelay-agent",
    );

    session::run(config).await;
}
