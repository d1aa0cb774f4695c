// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Schema validation for job envelopes, parsed content, and the HTTP
//! intake surface.
//!
//! Every message below is a `const`, referenced wherever it is raised, so
//! the bit-exact wording a caller asserts against has exactly one
//! definition site.

use recipe_core::ParsedFile;
use uuid::Uuid;

/// Maximum accepted HTML intake size: 10 MiB.
pub const MAX_HTML_CONTENT_BYTES: usize = 10 * 1024 * 1024;

pub const MSG_CONTENT_EMPTY: &str = "Content cannot be empty";
pub const MSG_CONTENT_TOO_LARGE: &str = "Content exceeds maximum size of 10485760 bytes";
pub const MSG_NOTE_ID_UUID: &str = "Note ID must be a valid UUID";
pub const MSG_PRIORITY_RANGE: &str = "Priority must be between 1 and 10";
pub const MSG_TIMEOUT_POSITIVE: &str = "Timeout must be a positive integer";
pub const MSG_TITLE_REQUIRED: &str = "Title is required";
pub const MSG_CONTENTS_REQUIRED: &str = "Contents are required";
pub const MSG_SOURCE_URL_FORMAT: &str = "Invalid source URL format";
pub const MSG_INVALID_NOTE_ID: &str = "Invalid note ID";
pub const MSG_INVALID_IMPORT_ID: &str = "Invalid import ID";
pub const MSG_INVALID_SOURCE_URL: &str = "Invalid source URL";
pub const MSG_INVALID_DATABASE_URL: &str = "Invalid database URL";
pub const MSG_JWT_SECRET_LEN: &str = "JWT secret must be at least 32 characters";
pub const MSG_API_KEY_LEN: &str = "API key must be at least 16 characters";

/// Minimum accepted length of `JWT_SECRET`.
pub const JWT_SECRET_MIN_LEN: usize = 32;
/// Minimum accepted length of `API_KEY`, when set.
pub const API_KEY_MIN_LEN: usize = 16;

/// One field-level validation failure, in the shape the HTTP intake
/// surface's `{error, details:[{field,message,code}]}` response needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub message: &'static str,
    pub code: recipe_core::ErrorCode,
}

impl ValidationIssue {
    fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message, code: recipe_core::ErrorCode::InvalidField }
    }
}

/// Accumulate every violation found rather than stopping at the first —
/// matches the source schema library's `safeParse` reporting all issues.
pub type ValidationResult = Result<(), Vec<ValidationIssue>>;

fn finish(errors: Vec<ValidationIssue>) -> ValidationResult {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validate raw HTML intake content: non-empty, at most [`MAX_HTML_CONTENT_BYTES`].
pub fn validate_intake_content(content: &str) -> ValidationResult {
    let mut errors = Vec::new();
    if content.is_empty() {
        errors.push(ValidationIssue::new("content", MSG_CONTENT_EMPTY));
    } else if content.len() > MAX_HTML_CONTENT_BYTES {
        errors.push(ValidationIssue::new("content", MSG_CONTENT_TOO_LARGE));
    }
    finish(errors)
}

/// Validate a job envelope's `priority` field: integer in `[1, 10]`.
pub fn validate_priority(priority: i64) -> ValidationResult {
    let mut errors = Vec::new();
    if !(1..=10).contains(&priority) {
        errors.push(ValidationIssue::new("priority", MSG_PRIORITY_RANGE));
    }
    finish(errors)
}

/// Validate a job envelope's `timeout` field: positive integer (ms).
pub fn validate_timeout(timeout_ms: i64) -> ValidationResult {
    let mut errors = Vec::new();
    if timeout_ms <= 0 {
        errors.push(ValidationIssue::new("timeout", MSG_TIMEOUT_POSITIVE));
    }
    finish(errors)
}

/// Validate a job envelope's optional `noteId` when present as a raw string.
pub fn validate_note_id_field(raw: &str) -> ValidationResult {
    let mut errors = Vec::new();
    if Uuid::parse_str(raw).is_err() {
        errors.push(ValidationIssue::new("noteId", MSG_NOTE_ID_UUID));
    }
    finish(errors)
}

/// Validate a `ParsedFile`: title and contents are required and non-empty.
pub fn validate_parsed_file(file: &ParsedFile) -> ValidationResult {
    let mut errors = Vec::new();
    if file.title.trim().is_empty() {
        errors.push(ValidationIssue::new("title", MSG_TITLE_REQUIRED));
    } else if file.title.chars().count() > 255 {
        errors.push(ValidationIssue::new("title", MSG_TITLE_REQUIRED));
    }
    if file.contents.trim().is_empty() {
        errors.push(ValidationIssue::new("contents", MSG_CONTENTS_REQUIRED));
    }
    if let Some(url) = file.source_url.as_deref() {
        if !is_plausible_url(url) {
            errors.push(ValidationIssue::new("sourceUrl", MSG_SOURCE_URL_FORMAT));
        }
    }
    finish(errors)
}

/// Validate the `:id` path parameter of `GET /notes/:id`.
pub fn validate_note_id_param(raw: &str) -> ValidationResult {
    let mut errors = Vec::new();
    if Uuid::parse_str(raw).is_err() {
        errors.push(ValidationIssue::new("id", MSG_INVALID_NOTE_ID));
    }
    finish(errors)
}

/// Validate an `importId` path/query parameter.
pub fn validate_import_id_param(raw: &str) -> ValidationResult {
    let mut errors = Vec::new();
    if Uuid::parse_str(raw).is_err() {
        errors.push(ValidationIssue::new("importId", MSG_INVALID_IMPORT_ID));
    }
    finish(errors)
}

/// Pagination parameters for `GET /notes`.
#[derive(Debug, Clone)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
    pub search: Option<String>,
}

/// Validate `GET /notes` paging: `page >= 1`, `limit` in `[1, 100]`,
/// `search` at most 100 characters.
pub fn validate_page_params(params: &PageParams) -> ValidationResult {
    let mut errors = Vec::new();
    if params.page < 1 {
        errors.push(ValidationIssue::new("page", "Page must be at least 1"));
    }
    if !(1..=100).contains(&params.limit) {
        errors.push(ValidationIssue::new("limit", "Limit must be between 1 and 100"));
    }
    if let Some(search) = &params.search {
        if search.chars().count() > 100 {
            errors.push(ValidationIssue::new("search", "Search must be at most 100 characters"));
        }
    }
    finish(errors)
}

/// Validate a `StatusEvent.indent_level`: integer in `[0, 10]`.
pub fn validate_indent_level(indent: i32) -> ValidationResult {
    let mut errors = Vec::new();
    if !(0..=10).contains(&indent) {
        errors.push(ValidationIssue::new("indentLevel", "Indent level must be between 0 and 10"));
    }
    finish(errors)
}

/// Validate a source URL string as used outside `ParsedFile` (e.g. the
/// PROCESS_SOURCE action's input).
pub fn validate_source_url(raw: &str) -> ValidationResult {
    let mut errors = Vec::new();
    if !is_plausible_url(raw) {
        errors.push(ValidationIssue::new("sourceUrl", MSG_INVALID_SOURCE_URL));
    }
    finish(errors)
}

/// Validate the `DATABASE_URL` environment variable.
pub fn validate_database_url(raw: &str) -> ValidationResult {
    let mut errors = Vec::new();
    if !(raw.starts_with("postgres://") || raw.starts_with("postgresql://") || raw == "memory://") {
        errors.push(ValidationIssue::new("DATABASE_URL", MSG_INVALID_DATABASE_URL));
    }
    finish(errors)
}

/// Validate the `JWT_SECRET` environment variable: at least
/// [`JWT_SECRET_MIN_LEN`] characters.
pub fn validate_jwt_secret(raw: &str) -> ValidationResult {
    let mut errors = Vec::new();
    if raw.chars().count() < JWT_SECRET_MIN_LEN {
        errors.push(ValidationIssue::new("JWT_SECRET", MSG_JWT_SECRET_LEN));
    }
    finish(errors)
}

/// Validate the optional `API_KEY` environment variable: at least
/// [`API_KEY_MIN_LEN`] characters when set.
pub fn validate_api_key(raw: &str) -> ValidationResult {
    let mut errors = Vec::new();
    if raw.chars().count() < API_KEY_MIN_LEN {
        errors.push(ValidationIssue::new("API_KEY", MSG_API_KEY_LEN));
    }
    finish(errors)
}

fn is_plausible_url(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}
