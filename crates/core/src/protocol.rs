//! Push-channel wire protocol.
//!
//! Every WebSocket text frame carries one JSON envelope of the form
//! `{"event": "<name>", "data": <payload>}`. Used by the relay when parsing
//! agent frames and pushing assignments, and by the agent for the reverse.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::{WorkerRecord, WorkerStatus};
use crate::types::{Timestamp, WorkerId};

/// Server -> agent: a job assignment.
pub const EVENT_BOT_JOB: &str = "bot-job";
/// Server -> all: a bot was released by the safety timeout.
pub const EVENT_BOT_TIMEOUT: &str = "bot-timeout";
/// Server -> all: a bot was released by completion or failure.
pub const EVENT_BOT_FREED: &str = "bot-freed";
/// Server -> all: full worker snapshot.
pub const EVENT_STATUS_UPDATE: &str = "status-update";
/// Agent -> server: bots hosted by this agent.
pub const EVENT_REGISTER_BOTS: &str = "register-bots";
/// Agent -> server: job finished.
pub const EVENT_TASK_COMPLETE: &str = "task-complete";
/// Agent -> server: job failed.
pub const EVENT_TASK_FAILED: &str = "task-failed";

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A job handed to one bot. Built per accepted request and discarded after
/// it has been pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAssignment {
    pub assignment_id: Uuid,
    pub bot_id: WorkerId,
    pub bot_name: String,
    pub place_id: String,
    pub job_id: String,
    pub requester: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Public view of a worker, as pushed in `status-update` and served by
/// `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub name: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<Timestamp>,
}

impl From<&WorkerRecord> for WorkerSnapshot {
    fn from(w: &WorkerRecord) -> Self {
        Self {
            id: w.id.clone(),
            name: w.display_name.clone(),
            status: w.status.as_str().to_string(),
            last_used: w.last_assigned_at,
        }
    }
}

impl WorkerSnapshot {
    pub fn is_status(&self, status: WorkerStatus) -> bool {
        self.status == status.as_str()
    }
}

/// `task-complete` payload. `assignment_id` echoes the id from the
/// `bot-job` frame; when present the relay only settles that assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskComplete {
    pub bot_id: WorkerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailed {
    pub bot_id: WorkerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<Uuid>,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Frames pushed by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    BotJob(JobAssignment),
    BotTimeout(WorkerId),
    BotFreed(WorkerId),
    StatusUpdate(Vec<WorkerSnapshot>),
}

impl ServerMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::BotJob(_) => EVENT_BOT_JOB,
            ServerMessage::BotTimeout(_) => EVENT_BOT_TIMEOUT,
            ServerMessage::BotFreed(_) => EVENT_BOT_FREED,
            ServerMessage::StatusUpdate(_) => EVENT_STATUS_UPDATE,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage is always serialisable")
    }
}

/// Frames sent by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum AgentMessage {
    RegisterBots(Vec<WorkerId>),
    TaskComplete(TaskComplete),
    TaskFailed(TaskFailed),
}

impl AgentMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            AgentMessage::RegisterBots(_) => EVENT_REGISTER_BOTS,
            AgentMessage::TaskComplete(_) => EVENT_TASK_COMPLETE,
            AgentMessage::TaskFailed(_) => EVENT_TASK_FAILED,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("AgentMessage is always serialisable")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn bot_job_uses_camel_case_fields() {
        let msg = ServerMessage::BotJob(JobAssignment {
            assignment_id: Uuid::nil(),
            bot_id: "bot1".into(),
            bot_name: "Alpha".into(),
            place_id: "123".into(),
            job_id: "abc".into(),
            requester: "42".into(),
            username: Some("builderman".into()),
        });

        let json: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(json["event"], EVENT_BOT_JOB);
        assert_eq!(json["data"]["botId"], "bot1");
        assert_eq!(json["data"]["botName"], "Alpha");
        assert_eq!(json["data"]["placeId"], "123");
        assert_eq!(json["data"]["username"], "builderman");
    }

    #[test]
    fn bot_timeout_carries_bare_id() {
        let json: serde_json::Value =
            serde_json::from_str(&ServerMessage::BotTimeout("bot2".into()).to_json()).unwrap();
        assert_eq!(json, serde_json::json!({"event": "bot-timeout", "data": "bot2"}));
    }

    #[test]
    fn parses_register_bots() {
        let msg: AgentMessage =
            serde_json::from_str(r#"{"event":"register-bots","data":["bot1","bot2"]}"#).unwrap();
        assert_matches!(msg, AgentMessage::RegisterBots(ids) if ids == ["bot1", "bot2"]);
    }

    #[test]
    fn parses_task_failed_without_error() {
        let msg: AgentMessage =
            serde_json::from_str(r#"{"event":"task-failed","data":{"botId":"bot3"}}"#).unwrap();
        assert_matches!(
            msg,
            AgentMessage::TaskFailed(TaskFailed { bot_id, assignment_id: None, error: None })
                if bot_id == "bot3"
        );
    }

    #[test]
    fn task_complete_echoes_assignment_id() {
        let id = Uuid::new_v4();
        let msg = AgentMessage::TaskComplete(TaskComplete {
            bot_id: "bot1".into(),
            assignment_id: Some(id),
        });

        let json: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(json["data"]["assignmentId"], id.to_string());

        let bare: AgentMessage =
            serde_json::from_str(r#"{"event":"task-complete","data":{"botId":"bot1"}}"#).unwrap();
        assert_matches!(
            bare,
            AgentMessage::TaskComplete(TaskComplete { assignment_id: None, .. })
        );
    }

    #[test]
    fn rejects_unknown_event() {
        let parsed = serde_json::from_str::<AgentMessage>(r#"{"event":"bot-job","data":{}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn snapshot_omits_never_used_timestamp() {
        let record = WorkerRecord::new(
            crate::registry::WorkerSpec::new("bot1", "Alpha"),
            WorkerStatus::Idle,
        );
        let json = serde_json::to_value(WorkerSnapshot::from(&record)).unwrap();
        assert_eq!(json, serde_json::json!({"id": "bot1", "name": "Alpha", "status": "idle"}));
    }
}
