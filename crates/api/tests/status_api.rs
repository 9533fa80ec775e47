//! Integration tests for liveness endpoints and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, body_text, build_app, build_test_app, get, test_config};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Test: GET /status reports the pool
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_lists_every_bot() {
    let (app, _state) = build_test_app();
    let response = get(app, "/status").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["online"], true);
    assert_eq!(json["isProcessing"], false);
    assert_eq!(json["agentsConnected"], 0);
    assert!(json.get("lastBot").is_none());

    let bots = json["bots"].as_array().unwrap();
    assert_eq!(bots.len(), 2);
    assert_eq!(bots[0]["id"], "bot1");
    assert_eq!(bots[0]["name"], "Alpha");
    assert_eq!(bots[0]["status"], "idle");
    assert_eq!(bots[1]["id"], "bot2");
}

#[tokio::test]
async fn status_shows_offline_pool_before_registration() {
    let mut config = test_config();
    config.workers_start_online = false;
    let (app, _state) = build_app(config);

    let json = body_json(get(app, "/status").await).await;
    for bot in json["bots"].as_array().unwrap() {
        assert_eq!(bot["status"], "offline");
    }
}

// ---------------------------------------------------------------------------
// Test: GET /ping returns plain "OK"
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_returns_ok_text() {
    let (app, _state) = build_test_app();
    let response = get(app, "/ping").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let (app, _state) = build_test_app();
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let (app, _state) = build_test_app();
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: GET on /request-bot is not allowed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_bot_rejects_get() {
    let (app, _state) = build_test_app();
    let response = get(app, "/request-bot").await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let (app, _state) = build_test_app();
    let response = get(app, "/status").await;

    let request_id = response.headers().get("x-request-id");
    assert!(
        request_id.is_some(),
        "Response must contain an x-request-id header"
    );

    let id_str = request_id.unwrap().to_str().unwrap();
    assert_eq!(id_str.len(), 36, "x-request-id should be a UUID string");
}

// ---------------------------------------------------------------------------
// Test: CORS preflight from a browser game client is allowed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let (app, _state) = build_test_app();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/request-bot")
        .header("Origin", "https://game.example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn cors_explicit_origin_list_echoes_allowed_origin() {
    let mut config = test_config();
    config.cors_origins = vec!["https://game.example.com".to_string()];
    let (app, _state) = build_app(config);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/request-bot")
        .header("Origin", "https://game.example.com")
        .header("Access-Control-Request-Method", "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(
        headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://game.example.com")
    );
    assert_eq!(
        headers
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
}
