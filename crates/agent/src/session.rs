//! Push-channel connection and job loop.
//!
//! Connects to the relay, registers this agent's bots, and runs every
//! `bot-job` addressed to one of them on its own task. Outcomes flow back
//! through a channel so the socket sink has a single writer.

use std::sync::Arc;
use std::time::Duration;

use botrelay_core::protocol::{AgentMessage, JobAssignment, ServerMessage, TaskComplete, TaskFailed};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::executor::{JobError, JobRunner};

/// Reconnection delay after a WebSocket failure.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Run the agent indefinitely.
///
/// Never returns under normal operation. Reconnects with a fixed delay when
/// the connection drops and registers again on every new connection.
pub async fn run(config: AgentConfig) {
    let bots: Arc<[String]> = config.bot_ids.clone().into();
    let runner = JobRunner::new(
        config.job_command.clone(),
        config.command_timeout,
        config.job_duration,
    );

    loop {
        tracing::info!(url = %config.ws_url, "Connecting to relay");

        match connect_async(config.ws_url.as_str()).await {
            Ok((ws_stream, _response)) => {
                tracing::info!("Relay connected");
                run_session(ws_stream, Arc::clone(&bots), runner.clone()).await;
                tracing::warn!("Relay session ended, reconnecting");
            }
            Err(e) => {
                tracing::error!(error = %e, "Relay connection failed");
            }
        }

        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Drive a single connection until it closes.
async fn run_session(ws_stream: WsStream, bots: Arc<[String]>, runner: JobRunner) {
    let (mut sink, mut stream) = ws_stream.split();

    let register = AgentMessage::RegisterBots(bots.to_vec());
    if let Err(e) = sink.send(Message::Text(register.to_json())).await {
        tracing::error!(error = %e, "Failed to register bots");
        return;
    }
    tracing::info!(bots = ?bots, "Registered bots");

    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<AgentMessage>();

    loop {
        tokio::select! {
            Some(outcome) = outcome_rx.recv() => {
                tracing::debug!(event = outcome.event_name(), "Reporting job outcome");
                if let Err(e) = sink.send(Message::Text(outcome.to_json())).await {
                    tracing::error!(error = %e, "Failed to report job outcome");
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_incoming(&text, &bots, &runner, &outcome_tx);
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Relay closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "WebSocket receive error");
                        break;
                    }
                    None => {
                        tracing::info!("WebSocket stream exhausted");
                        break;
                    }
                }
            }
        }
    }
}

/// Parse and dispatch one frame from the relay.
fn handle_incoming(
    text: &str,
    bots: &Arc<[String]>,
    runner: &JobRunner,
    outcome_tx: &mpsc::UnboundedSender<AgentMessage>,
) {
    let message = match serde_json::from_str::<ServerMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, raw = %text, "Unknown or malformed relay message");
            return;
        }
    };

    match message {
        ServerMessage::BotJob(job) => {
            if !bots.iter().any(|b| *b == job.bot_id) {
                tracing::debug!(bot_id = %job.bot_id, "Ignoring job for a bot this agent does not own");
                return;
            }
            tracing::info!(
                bot_id = %job.bot_id,
                place_id = %job.place_id,
                job_id = %job.job_id,
                requester = %job.requester,
                "Received job",
            );
            spawn_job(job, runner.clone(), outcome_tx.clone());
        }
        ServerMessage::BotTimeout(bot_id) => {
            tracing::warn!(bot_id = %bot_id, "Relay timed out a job for this bot");
        }
        ServerMessage::BotFreed(bot_id) => {
            tracing::debug!(bot_id = %bot_id, "Bot freed");
        }
        ServerMessage::StatusUpdate(bots) => {
            tracing::trace!(count = bots.len(), "Status update");
        }
    }
}

fn spawn_job(job: JobAssignment, runner: JobRunner, outcome_tx: mpsc::UnboundedSender<AgentMessage>) {
    tokio::spawn(async move {
        let result = runner.run(&job).await;
        let report = outcome(job.bot_id, job.assignment_id, result);
        if outcome_tx.send(report).is_err() {
            tracing::warn!("Session closed before the job outcome could be reported");
        }
    });
}

/// Map a job result to the event reported to the relay. The assignment id
/// is echoed so a late report cannot settle a newer job on the same bot.
pub fn outcome(bot_id: String, assignment_id: Uuid, result: Result<(), JobError>) -> AgentMessage {
    let assignment_id = Some(assignment_id);
    match result {
        Ok(()) => AgentMessage::TaskComplete(TaskComplete {
            bot_id,
            assignment_id,
        }),
        Err(e) => AgentMessage::TaskFailed(TaskFailed {
            bot_id,
            assignment_id,
            error: Some(e.to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn success_maps_to_task_complete() {
        let id = Uuid::new_v4();
        let msg = outcome("bot1".into(), id, Ok(()));
        assert_matches!(
            msg,
            AgentMessage::TaskComplete(TaskComplete { bot_id, assignment_id: Some(echoed) })
                if bot_id == "bot1" && echoed == id
        );
    }

    #[test]
    fn failure_maps_to_task_failed_with_reason() {
        let id = Uuid::new_v4();
        let msg = outcome("bot2".into(), id, Err(JobError::TimedOut(120)));
        assert_matches!(
            msg,
            AgentMessage::TaskFailed(TaskFailed { bot_id, assignment_id: Some(echoed), error: Some(error) })
                if bot_id == "bot2" && echoed == id && error == "job command timed out after 120s"
        );
    }

    fn job_for(bot_id: &str) -> JobAssignment {
        JobAssignment {
            assignment_id: Uuid::new_v4(),
            bot_id: bot_id.into(),
            bot_name: bot_id.into(),
            place_id: "1".into(),
            job_id: "j".into(),
            requester: "u".into(),
            username: None,
        }
    }

    async fn next_agent_message(
        ws: &mut tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    ) -> AgentMessage {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let Message::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    /// A stand-in relay: accepts one connection, checks registration, pushes
    /// a foreign job and an owned job, and expects exactly one outcome.
    #[tokio::test]
    async fn session_registers_runs_owned_job_and_reports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = AgentConfig {
            ws_url: format!("ws://{addr}"),
            bot_ids: vec!["bot1".into()],
            job_command: None,
            job_duration: Duration::ZERO,
            command_timeout: Duration::from_secs(5),
        };
        let agent = tokio::spawn(run(config));

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        assert_eq!(
            next_agent_message(&mut ws).await,
            AgentMessage::RegisterBots(vec!["bot1".into()])
        );

        let owned = job_for("bot1");
        for job in [job_for("bot9"), owned.clone()] {
            let frame = ServerMessage::BotJob(job).to_json();
            ws.send(Message::Text(frame)).await.unwrap();
        }

        assert_eq!(
            next_agent_message(&mut ws).await,
            AgentMessage::TaskComplete(TaskComplete {
                bot_id: "bot1".into(),
                assignment_id: Some(owned.assignment_id),
            })
        );

        agent.abort();
    }
}
