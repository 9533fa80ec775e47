#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, Response};
use axum::Router;
use botrelay_api::config::ServerConfig;
use botrelay_api::router::build_app_router;
use botrelay_api::state::AppState;
use botrelay_core::registry::WorkerSpec;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with a two-bot pool that starts online.
///
/// Uses the permissive `*` CORS origin (the production default) and no job
/// log endpoint.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        log_webhook_url: None,
        bots: vec![
            WorkerSpec::new("bot1", "Alpha"),
            WorkerSpec::new("bot2", "Bravo"),
        ],
        workers_start_online: true,
        single_job_mode: true,
        cooldown: Some(Duration::from_secs(300)),
        job_timeout: Duration::from_secs(180),
        job_eta: Duration::from_secs(60),
        busy_retry_after: Duration::from_secs(30),
    }
}

/// Build the full application router from `config`.
///
/// Uses the same [`build_app_router`] as `main.rs` so tests exercise the
/// production middleware stack. The state is returned alongside so tests
/// can drive the relay directly (agent callbacks, timeouts).
pub fn build_app(config: ServerConfig) -> (Router, AppState) {
    let state = AppState::from_config(config.clone());
    let app = build_app_router(state.clone(), &config);
    (app, state)
}

pub fn build_test_app() -> (Router, AppState) {
    build_app(test_config())
}

/// Issue a GET request through the router.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Issue a POST request with a JSON body through the router.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

/// Issue a POST request with an arbitrary body labelled as JSON.
pub async fn post_raw(app: Router, uri: &str, body: String) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body as UTF-8 text.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A well-formed bot request body.
pub fn bot_request(requester: &str) -> serde_json::Value {
    serde_json::json!({
        "placeId": "920587237",
        "jobId": "a1b2c3d4-job",
        "requester": requester,
        "username": "player_one",
    })
}
