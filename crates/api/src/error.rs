use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use botrelay_core::dispatcher::DispatchError;
use botrelay_core::error::CoreError;
use botrelay_core::protocol::WorkerSnapshot;
use botrelay_core::registry::WorkerStatus;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`DispatchError`] and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// bodies of the form `{ "error": ..., "code": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bot request the dispatcher refused.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Dispatch(err) => dispatch_response(err),
            AppError::Core(CoreError::Validation(msg)) => {
                error_response(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
            }
            AppError::BadRequest(msg) => error_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
        }
    }
}

fn error_response(status: StatusCode, code: &'static str, message: String) -> Response {
    let body = json!({
        "error": message,
        "code": code,
    });
    (status, axum::Json(body)).into_response()
}

/// Map a dispatcher refusal to its HTTP form.
///
/// - `RateLimited` -> 429 with `retryAfter` and a `Retry-After` header.
/// - `CapacityExceeded` -> 503 naming the busy bot, with `retryAfter`.
/// - `NoWorkersAvailable` -> 503 with the full `botsStatus` snapshot.
fn dispatch_response(err: DispatchError) -> Response {
    let message = err.to_string();
    match err {
        DispatchError::RateLimited { retry_after } => with_retry_after(
            StatusCode::TOO_MANY_REQUESTS,
            json!({
                "error": message,
                "code": "RATE_LIMITED",
                "retryAfter": retry_after.as_secs(),
            }),
            retry_after.as_secs(),
        ),
        DispatchError::CapacityExceeded {
            busy_worker,
            retry_after,
        } => with_retry_after(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "error": message,
                "code": "BOT_BUSY",
                "busyBot": busy_worker,
                "retryAfter": retry_after.as_secs(),
            }),
            retry_after.as_secs(),
        ),
        DispatchError::NoWorkersAvailable { workers } => {
            let message = if agent_absent(&workers) {
                format!("{message} (agent not connected)")
            } else {
                message
            };
            let body = json!({
                "error": message,
                "code": "NO_BOTS_AVAILABLE",
                "botsStatus": workers,
            });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body)).into_response()
        }
    }
}

/// Every bot offline means no agent has registered them.
fn agent_absent(workers: &[WorkerSnapshot]) -> bool {
    !workers.is_empty() && workers.iter().all(|w| w.is_status(WorkerStatus::Offline))
}

fn with_retry_after(status: StatusCode, body: serde_json::Value, secs: u64) -> Response {
    let mut response = (status, axum::Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
