// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The HTTP intake surface: `POST /import`, `GET /import/status`,
//! `GET /notes`, `GET /notes/:id`, `GET /health`, `GET /test`.

pub mod middleware;

use axum::{
    extract::{Path as AxPath, Query, State},
    http::StatusCode,
    middleware::from_fn,
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use recipe_config::AppConfig;
use recipe_core::{JobEnvelope, NoteStatus, QueueName, StatusEvent};
use recipe_queue::QueueBroker;
use recipe_runtime::AppContext;
use recipe_validate::{PageParams, ValidationIssue};
use recipe_workers::NoteJobData;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

/// Shared daemon state: the dependency container plus the handful of
/// process-local facts the HTTP layer needs that `AppContext` has no
/// reason to carry (startup time, the most recently submitted import).
pub struct AppState {
    pub ctx: AppContext,
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
    /// Tracks the single most recent `POST /import` for `GET /import/status`,
    /// which takes no id parameter — a single-tenant daemon only ever has
    /// one import in flight at a time in practice.
    latest_import: Mutex<Option<Uuid>>,
}

impl AppState {
    pub fn new(ctx: AppContext, config: Arc<AppConfig>) -> Self {
        Self { ctx, config, started_at: Instant::now(), latest_import: Mutex::new(None) }
    }
}

/// A generic daemon-level error, mapped to `{"error": message}` (mirrors
/// the source's bare-error envelope for anything that isn't a schema
/// validation failure).
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Serialize)]
struct ValidationIssueBody {
    field: &'static str,
    message: &'static str,
    code: &'static str,
}

/// The shape every schema rejection returns: HTTP 400 with
/// `{error:"Validation failed", details:[{field,message,code}]}`.
fn validation_failed(issues: Vec<ValidationIssue>) -> Response {
    let details: Vec<ValidationIssueBody> =
        issues.into_iter().map(|i| ValidationIssueBody { field: i.field, message: i.message, code: i.code.code() }).collect();
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "Validation failed", "details": details }))).into_response()
}

/// Build the Axum router with all daemon routes and ambient middleware.
pub fn build_app(state: Arc<AppState>) -> Router {
    let rate_limiter = middleware::RateLimiter::new(
        state.config.rate_limit_max_requests,
        std::time::Duration::from_millis(state.config.rate_limit_window_ms),
    );

    Router::new()
        .route("/import", post(post_import))
        .route("/import/status", get(get_import_status))
        .route("/notes", get(get_notes))
        .route("/notes/{id}", get(get_note))
        .route("/notes/{id}/stream", get(get_note_stream))
        .route("/health", get(get_health))
        .route("/test", get(get_test))
        .layer(rate_limiter.into_layer())
        .layer(from_fn(middleware::request_logger))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ImportRequest {
    #[serde(default)]
    content: String,
}

async fn post_import(State(state): State<Arc<AppState>>, body: Option<Json<ImportRequest>>) -> Response {
    let content = body.map(|Json(req)| req.content).unwrap_or_default();

    if let Err(issues) = recipe_validate::validate_intake_content(&content) {
        return validation_failed(issues);
    }

    let import_id = Uuid::new_v4();
    if let Err(err) = state.ctx.notes.create_import(import_id, Vec::new()).await {
        return ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }

    let job = JobEnvelope::new(NoteJobData::new(content, import_id), None, Some(import_id));
    if let Err(err) = state.ctx.broker.enqueue(QueueName::Note, job_to_wire(job)).await {
        return ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }

    *state.latest_import.lock().await = Some(import_id);
    state.ctx.broadcaster.add_status_event_and_broadcast(recipe_core::StatusEvent::processing(import_id, None, "Import queued"));

    (StatusCode::ACCEPTED, Json(json!({ "importId": import_id }))).into_response()
}

/// `recipe_queue::Job` carries an untyped `serde_json::Value` payload;
/// every concrete `*JobData` crosses that boundary through this
/// round-trip rather than a direct cast.
fn job_to_wire<D: Serialize>(job: JobEnvelope<D>) -> recipe_queue::Job {
    let data = serde_json::to_value(job.data).expect("job payload is always JSON-serializable");
    recipe_queue::Job {
        job_id: job.job_id,
        note_id: job.note_id,
        import_id: job.import_id,
        metadata: job.metadata,
        priority: job.priority,
        timeout_ms: job.timeout_ms,
        attempt_number: job.attempt_number,
        max_retries: job.max_retries,
        created_at: job.created_at,
        data,
    }
}

async fn get_import_status(State(state): State<Arc<AppState>>) -> Response {
    let import_id = match *state.latest_import.lock().await {
        Some(id) => id,
        None => return ApiError::new(StatusCode::NOT_FOUND, "no import has been submitted yet").into_response(),
    };

    let import = match state.ctx.notes.get_import(import_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return ApiError::new(StatusCode::NOT_FOUND, "import not found").into_response(),
        Err(err) => return ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    };

    let notes: Vec<_> = import
        .note_ids
        .iter()
        .map(|note_id| {
            let snapshot = state.ctx.tracker.check(*note_id);
            json!({ "noteId": note_id, "completedJobs": snapshot.completed_jobs, "totalJobs": snapshot.total_jobs, "isComplete": snapshot.is_complete })
        })
        .collect();

    Json(json!({
        "importId": import.import_id,
        "status": import.status,
        "createdAt": import.created_at,
        "notes": notes,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct NotesQuery {
    page: Option<i64>,
    limit: Option<i64>,
    status: Option<String>,
    search: Option<String>,
}

fn parse_note_status(raw: &str) -> Result<NoteStatus, Response> {
    match raw {
        "PENDING" => Ok(NoteStatus::Pending),
        "PROCESSING" => Ok(NoteStatus::Processing),
        "COMPLETED" => Ok(NoteStatus::Completed),
        "FAILED" => Ok(NoteStatus::Failed),
        _ => Err(validation_failed(vec![ValidationIssue {
            field: "status",
            message: "Status must be one of PENDING, PROCESSING, COMPLETED, FAILED",
            code: recipe_core::ErrorCode::InvalidField,
        }])),
    }
}

async fn get_notes(State(state): State<Arc<AppState>>, Query(q): Query<NotesQuery>) -> Response {
    let page = q.page.unwrap_or(1);
    let limit = q.limit.unwrap_or(20);

    if let Err(issues) = recipe_validate::validate_page_params(&PageParams { page, limit, search: q.search.clone() }) {
        return validation_failed(issues);
    }

    let status = match q.status.as_deref() {
        Some(raw) => match parse_note_status(raw) {
            Ok(status) => Some(status),
            Err(resp) => return resp,
        },
        None => None,
    };

    match state.ctx.notes.list_notes(page, limit, status, q.search.as_deref()).await {
        Ok(notes) => Json(json!({ "notes": notes, "page": page, "limit": limit })).into_response(),
        Err(err) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn get_note(State(state): State<Arc<AppState>>, AxPath(id): AxPath<String>) -> Response {
    if let Err(issues) = recipe_validate::validate_note_id_param(&id) {
        return validation_failed(issues);
    }
    let note_id = Uuid::parse_str(&id).expect("validated above");

    match state.ctx.notes.get_note_with_evernote_metadata(note_id).await {
        Ok(Some(note)) => Json(note).into_response(),
        Ok(None) => ApiError::new(StatusCode::NOT_FOUND, "note not found").into_response(),
        Err(err) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// The subscriber transport's wire format: `StatusEvent` as an SSE
/// `data:` payload, replayed log first then live events, filtered to
/// `id`'s note.
async fn get_note_stream(
    State(state): State<Arc<AppState>>,
    AxPath(id): AxPath<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, Response> {
    if let Err(issues) = recipe_validate::validate_note_id_param(&id) {
        return Err(validation_failed(issues));
    }
    let note_id = Uuid::parse_str(&id).expect("validated above");

    let replayed = state.ctx.broadcaster.replay(note_id);
    let live = BroadcastStream::new(state.ctx.broadcaster.subscribe())
        .filter_map(move |item| item.ok())
        .filter(move |event: &StatusEvent| event.note_id == Some(note_id));

    let stream = tokio_stream::iter(replayed).chain(live).map(|event| {
        Ok(SseEvent::default().json_data(event).unwrap_or_else(|_| SseEvent::default().data("serialization error")))
    });

    Ok(Sse::new(stream))
}

async fn get_health(State(state): State<Arc<AppState>>, Query(q): Query<HashMap<String, String>>) -> Response {
    let mut body = json!({ "status": "ok" });

    if q.contains_key("detailed") {
        body["uptimeSeconds"] = json!(state.started_at.elapsed().as_secs());
    }
    if q.contains_key("includeMetrics") {
        body["metrics"] = json!({
            "eventsPublished": state.ctx.broadcaster.published_count(),
            "eventsDropped": state.ctx.broadcaster.dropped_count(),
        });
    }

    Json(body).into_response()
}

#[derive(Debug, Deserialize)]
struct TestQuery {
    action: Option<String>,
}

async fn get_test(State(state): State<Arc<AppState>>, Query(q): Query<TestQuery>) -> Response {
    let action = match q.action.as_deref() {
        Some(action) => action,
        None => return ApiError::new(StatusCode::BAD_REQUEST, "action is required").into_response(),
    };

    let (ok, detail) = match action {
        "health" => (true, "daemon is running".to_string()),
        "database" => {
            state.ctx.notes.get_note_title(Uuid::nil()).await;
            (true, "persistence layer reachable".to_string())
        }
        "queue" | "redis" => match state.ctx.broker.ack(QueueName::Note, "recipe-daemon-liveness-probe").await {
            Ok(()) => (true, "broker reachable".to_string()),
            Err(recipe_queue::QueueError::UnknownJob(_)) => (true, "broker reachable".to_string()),
            Err(err) => (false, err.to_string()),
        },
        other => return ApiError::new(StatusCode::BAD_REQUEST, format!("unknown test action: {other}")).into_response(),
    };

    Json(json!({ "action": action, "ok": ok, "detail": detail })).into_response()
}
