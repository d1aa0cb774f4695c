// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The pipeline's persisted and in-flight data shapes.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Parse status shared by ingredient and instruction lines.
///
/// Resolves the "CORRECT/ERROR vs COMPLETED_SUCCESSFULLY/COMPLETED_WITH_ERROR"
/// naming inconsistency noted as an open question: this workspace uses the
/// latter pair everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseStatus {
    /// The line has been scheduled but not yet parsed.
    AwaitingParsing,
    /// Parsing produced a usable result.
    CompletedSuccessfully,
    /// Parsing failed; the line is kept with its raw text only.
    CompletedWithError,
}

/// A single parsed ingredient line, ordered by `(block_index, line_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedIngredientLine {
    pub id: Uuid,
    pub reference: String,
    pub block_index: u32,
    pub line_index: u32,
    pub parse_status: ParseStatus,
}

/// A single parsed instruction line, ordered by `line_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedInstructionLine {
    pub id: Uuid,
    pub original_text: String,
    pub normalized_text: Option<String>,
    pub line_index: u32,
    pub parse_status: ParseStatus,
}

/// Evernote-style metadata carried alongside a parsed note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EvernoteMetadata {
    pub source: Option<String>,
    pub original_created_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    /// The Evernote notebook this note lived in; drives DETERMINE_CATEGORY.
    pub notebook: Option<String>,
}

/// The output of HTML parsing: `content -> ParsedFile`.
///
/// `title` and `contents` are required and non-empty; `ingredients` and
/// `instructions` default to empty sequences when the source document has
/// none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedFile {
    pub title: String,
    pub contents: String,
    #[serde(default)]
    pub ingredients: Vec<ParsedIngredientLine>,
    #[serde(default)]
    pub instructions: Vec<ParsedInstructionLine>,
    pub evernote_metadata: Option<EvernoteMetadata>,
    pub image: Option<String>,
    pub historical_created_at: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
}

/// A persisted recipe note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Note {
    pub note_id: Uuid,
    pub import_id: Uuid,
    pub title: String,
    pub status: NoteStatus,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub error_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The Evernote notebook this note was imported from, if any.
    pub notebook: Option<String>,
    /// The Evernote source attribute (e.g. `web.clip`), if any.
    pub evernote_source: Option<String>,
    /// The note's original creation time in Evernote, if available —
    /// distinct from `created_at`, which is when it landed in this system.
    pub original_created_at: Option<DateTime<Utc>>,
    /// Tags carried over from Evernote at import time, distinct from
    /// `tags`, which DETERMINE_TAGS assigns.
    pub evernote_tags: Vec<String>,
}

/// Lifecycle status of a note, also used as the `StatusEvent.status` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A snapshot of one import batch, grouping the notes it produced
/// ("one intake -> one import -> one or more notes"). Backs
/// `GET /import/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImportRecord {
    pub import_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub note_ids: Vec<Uuid>,
    pub status: NoteStatus,
}

/// Free-form job metadata. Kept as an untyped JSON map since each action
/// reads and writes a different subset of keys (mirrors the source's
/// `mapping string -> unknown`).
pub type Metadata = HashMap<String, serde_json::Value>;

/// The job envelope carried on every queue.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobEnvelope<D> {
    pub job_id: String,
    pub note_id: Option<Uuid>,
    pub import_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: Metadata,
    pub priority: u8,
    pub timeout_ms: u64,
    pub attempt_number: u32,
    pub max_retries: u8,
    pub created_at: DateTime<Utc>,
    pub data: D,
}

impl<D> JobEnvelope<D> {
    pub const DEFAULT_PRIORITY: u8 = 5;
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
    pub const DEFAULT_MAX_RETRIES: u8 = 3;

    /// Build an envelope with the source's documented defaults, wrapping
    /// `data` with a freshly generated job id and the current time.
    pub fn new(data: D, note_id: Option<Uuid>, import_id: Option<Uuid>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            note_id,
            import_id,
            metadata: Metadata::new(),
            priority: Self::DEFAULT_PRIORITY,
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            attempt_number: 1,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            created_at: Utc::now(),
            data,
        }
    }
}

/// A snapshot of a note's fan-out completion state, as returned by
/// `CompletionTracker::check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CompletionSnapshot {
    pub total_jobs: u64,
    /// Signed because `update` accepts negative values without clamping.
    pub completed_jobs: i64,
    pub is_complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_new_applies_defaults() {
        let env = JobEnvelope::new((), None, None);
        assert_eq!(env.priority, 5);
        assert_eq!(env.timeout_ms, 30_000);
        assert_eq!(env.attempt_number, 1);
        assert_eq!(env.max_retries, 3);
    }
}
