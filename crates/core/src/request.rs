//! Incoming bot request payload.

use serde::{Deserialize, Deserializer};
use validator::Validate;

/// A web client's request for a bot to join a game session.
///
/// `placeId` and `jobId` are accepted as JSON strings or numbers since
/// clients send either.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(deserialize_with = "string_or_number")]
    #[validate(length(min = 1, max = 128, message = "placeId must be 1-128 characters"))]
    pub place_id: String,

    #[serde(deserialize_with = "string_or_number")]
    #[validate(length(min = 1, max = 128, message = "jobId must be 1-128 characters"))]
    pub job_id: String,

    #[serde(alias = "requesterId", alias = "userId", deserialize_with = "string_or_number")]
    #[validate(length(min = 1, max = 128, message = "requester must be 1-128 characters"))]
    pub requester: String,

    #[serde(default)]
    #[validate(length(max = 128, message = "username must be at most 128 characters"))]
    pub username: Option<String>,
}

impl JobRequest {
    pub fn new(
        place_id: impl Into<String>,
        job_id: impl Into<String>,
        requester: impl Into<String>,
        username: Option<String>,
    ) -> Self {
        Self {
            place_id: place_id.into(),
            job_id: job_id.into(),
            requester: requester.into(),
            username,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s.trim().to_string(),
        Raw::Num(n) => n.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
