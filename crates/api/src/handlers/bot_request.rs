//! Handler for `POST /request-bot`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use botrelay_core::dispatcher::human_wait;
use botrelay_core::error::CoreError;
use botrelay_core::request::JobRequest;
use serde::Serialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Success body. The job has been pushed, not completed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotRequestResponse {
    pub success: bool,
    pub message: String,
    pub bot_name: String,
    pub eta: String,
}

/// POST /request-bot
///
/// Assigns the least-recently-used idle bot and pushes the job to the agent.
/// Replies immediately; refusals map to 429/503 via [`AppError`].
pub async fn request_bot(
    State(state): State<AppState>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> AppResult<Json<BotRequestResponse>> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    request.validate().map_err(CoreError::from)?;

    let assignment = match state.relay.request_job(&request).await {
        Ok(assignment) => assignment,
        Err(e) => {
            tracing::info!(
                requester = %request.requester,
                place_id = %request.place_id,
                reason = %e,
                "Bot request refused",
            );
            return Err(e.into());
        }
    };

    Ok(Json(BotRequestResponse {
        success: true,
        message: format!("{} is joining your server", assignment.bot_name),
        bot_name: assignment.bot_name,
        eta: format!("~{}", human_wait(state.config.job_eta)),
    }))
}
