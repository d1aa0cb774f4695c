// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios against the HTTP intake surface, exercised
//! through the Axum router directly rather than a bound socket.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use recipe_config::AppConfig;
use recipe_daemon::{build_app, AppState};
use recipe_persistence::InMemoryNoteStore;
use recipe_queue::InMemoryBroker;
use recipe_retry::ErrorHandler;
use recipe_runtime::{AppContext, CompletionTracker, StatusBroadcaster};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_config() -> AppConfig {
    AppConfig {
        port: 8080,
        ws_port: 8081,
        ws_host: Some("localhost".to_string()),
        database_url: "memory://".to_string(),
        redis_host: "memory".to_string(),
        redis_port: 6379,
        redis_password: None,
        jwt_secret: "0123456789012345678901234567890123456789".to_string(),
        api_key: None,
        rate_limit_window_ms: 60_000,
        rate_limit_max_requests: 100,
        max_file_size_bytes: 10_485_760,
        max_request_size_bytes: 10_485_760,
    }
}

fn test_app() -> axum::Router {
    let ctx = AppContext::new(
        Arc::new(InMemoryBroker::new()),
        Arc::new(InMemoryNoteStore::new()),
        Arc::new(StatusBroadcaster::new()),
        Arc::new(CompletionTracker::new()),
        Arc::new(ErrorHandler::new()),
    );
    let state = Arc::new(AppState::new(ctx, Arc::new(test_config())));
    build_app(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn request_with_body(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A well-formed import is accepted and queued. Exercises only the HTTP
/// intake boundary — `worker_scenarios.rs` covers what happens once the
/// NOTE job is actually processed.
#[tokio::test]
async fn post_import_accepts_well_formed_content() {
    let app = test_app();
    let body = json!({ "content": "<html><body><h1>Soup</h1></body></html>" });
    let response = app.oneshot(request_with_body("POST", "/import", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert!(body["importId"].is_string());
}

/// A follow-up `GET /import/status` reports the import just created.
#[tokio::test]
async fn import_status_reports_the_just_created_import() {
    let app = test_app();
    let body = json!({ "content": "<html><body><h1>Soup</h1></body></html>" });
    let response = app.clone().oneshot(request_with_body("POST", "/import", body)).await.unwrap();
    let import_id = body_json(response).await["importId"].as_str().unwrap().to_string();

    let response = app.oneshot(Request::builder().uri("/import/status").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["importId"].as_str().unwrap(), import_id);
}

/// Empty content is rejected with the exact validation error shape.
#[tokio::test]
async fn empty_content_import_is_rejected_with_validation_details() {
    let app = test_app();
    let body = json!({ "content": "" });
    let response = app.oneshot(request_with_body("POST", "/import", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["details"][0]["field"], "content");
    assert_eq!(body["details"][0]["message"], "Content cannot be empty");
    assert_eq!(body["details"][0]["code"], "RCP-V002");
}

/// A missing body degrades to empty content rather than a 415/422.
#[tokio::test]
async fn post_import_without_a_body_is_treated_as_empty_content() {
    let app = test_app();
    let response = app.oneshot(Request::builder().method("POST").uri("/import").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"][0]["field"], "content");
}

/// An unknown note id returns 404, not a validation failure.
#[tokio::test]
async fn get_note_with_unknown_id_is_404() {
    let app = test_app();
    let id = uuid::Uuid::new_v4();
    let response = app.oneshot(Request::builder().uri(format!("/notes/{id}")).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// A malformed note id is a validation failure, not a 404.
#[tokio::test]
async fn malformed_note_id_is_validation_failure() {
    let app = test_app();
    let response = app.oneshot(Request::builder().uri("/notes/not-a-uuid").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"][0]["field"], "id");
}

/// `GET /notes` paginates and rejects an out-of-range limit.
#[tokio::test]
async fn notes_listing_paginates_and_rejects_invalid_limit() {
    let app = test_app();
    let response = app.clone().oneshot(Request::builder().uri("/notes?page=1&limit=20").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["notes"].as_array().unwrap().len(), 0);

    let response = app.oneshot(Request::builder().uri("/notes?page=1&limit=0").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// An unrecognized status filter is a validation failure naming the field.
#[tokio::test]
async fn notes_listing_rejects_unknown_status() {
    let app = test_app();
    let response = app.oneshot(Request::builder().uri("/notes?status=BOGUS").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"][0]["field"], "status");
}

/// `GET /health` reports ok, and with `includeMetrics` also reports the
/// broadcaster's publish/drop counters.
#[tokio::test]
async fn health_reports_metrics_when_requested() {
    let app = test_app();
    let response = app.clone().oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body.get("metrics").is_none());

    let response = app.oneshot(Request::builder().uri("/health?includeMetrics=1").body(Body::empty()).unwrap()).await.unwrap();
    let body = body_json(response).await;
    assert!(body["metrics"]["eventsPublished"].is_number());
}

/// `GET /test` probes each backend without consuming real queue state.
#[tokio::test]
async fn test_endpoint_probes_queue_reachability() {
    let app = test_app();
    let response = app.oneshot(Request::builder().uri("/test?action=queue").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
}

/// `GET /test` with no action query param is a 400, not a panic.
#[tokio::test]
async fn test_endpoint_requires_an_action() {
    let app = test_app();
    let response = app.oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// `GET /notes/:id/stream` validates its path param the same way the
/// plain `GET /notes/:id` route does, before ever touching the broadcaster.
#[tokio::test]
async fn note_stream_validates_the_note_id() {
    let app = test_app();
    let response = app.oneshot(Request::builder().uri("/notes/not-a-uuid/stream").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// A valid note id opens an SSE stream even with no events yet replayed.
#[tokio::test]
async fn note_stream_opens_for_a_valid_note_id() {
    let app = test_app();
    let id = uuid::Uuid::new_v4();
    let response = app.oneshot(Request::builder().uri(format!("/notes/{id}/stream")).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "text/event-stream");
}

/// Every response carries the `x-request-id` header set by the
/// request-id middleware, regardless of status.
#[tokio::test]
async fn every_response_carries_a_request_id() {
    let app = test_app();
    let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
