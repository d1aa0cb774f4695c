// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The externally visible progress record and its construction helpers.

use crate::model::{Metadata, NoteStatus};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Maximum length, in characters, of [`StatusEvent::message`].
pub const MAX_MESSAGE_LEN: usize = 1000;
/// Maximum length, in characters, of [`StatusEvent::context`].
pub const MAX_CONTEXT_LEN: usize = 500;
/// Inclusive bounds of [`StatusEvent::indent_level`].
pub const INDENT_RANGE: std::ops::RangeInclusive<i32> = 0..=10;

/// An externally visible progress record.
///
/// Events sharing a `(note_id, context)` pair must be delivered to any one
/// subscriber in the order they were appended to the broadcaster's log.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusEvent {
    pub import_id: Uuid,
    pub note_id: Option<Uuid>,
    pub status: NoteStatus,
    pub message: String,
    pub context: String,
    pub current_count: Option<u64>,
    pub total_count: Option<u64>,
    pub indent_level: i32,
    #[serde(default)]
    pub metadata: Metadata,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    /// `status=PROCESSING`, default indent 1, default context `"processing"`.
    pub fn processing(import_id: Uuid, note_id: Option<Uuid>, message: impl Into<String>) -> Self {
        Self {
            import_id,
            note_id,
            status: NoteStatus::Processing,
            message: message.into(),
            context: "processing".to_string(),
            current_count: None,
            total_count: None,
            indent_level: 1,
            metadata: Metadata::new(),
            timestamp: Utc::now(),
        }
    }

    /// `status=COMPLETED`, default indent 0, default context `"import_complete"`.
    pub fn completion(import_id: Uuid, note_id: Option<Uuid>, message: impl Into<String>) -> Self {
        Self {
            import_id,
            note_id,
            status: NoteStatus::Completed,
            message: message.into(),
            context: "import_complete".to_string(),
            current_count: None,
            total_count: None,
            indent_level: 0,
            metadata: Metadata::new(),
            timestamp: Utc::now(),
        }
    }

    /// Progress event: status toggles to COMPLETED when `current == total`;
    /// message is `"{emoji} {current}/{total} {item_type}"`; metadata is
    /// augmented with `{current, total, is_complete}`. This is the only
    /// place progress numerators/denominators are derived — workers must
    /// not build these strings themselves.
    pub fn progress(
        import_id: Uuid,
        note_id: Option<Uuid>,
        context: impl Into<String>,
        item_type: &str,
        current: u64,
        total: u64,
    ) -> Self {
        let is_complete = current >= total;
        let status = if is_complete { NoteStatus::Completed } else { NoteStatus::Processing };
        let emoji = if is_complete { "\u{2705}" } else { "\u{23f3}" };
        let mut metadata = Metadata::new();
        metadata.insert("current".to_string(), json!(current));
        metadata.insert("total".to_string(), json!(total));
        metadata.insert("isComplete".to_string(), json!(is_complete));
        Self {
            import_id,
            note_id,
            status,
            message: format!("{emoji} {current}/{total} {item_type}"),
            context: context.into(),
            current_count: Some(current),
            total_count: Some(total),
            indent_level: 1,
            metadata,
            timestamp: Utc::now(),
        }
    }

    /// `status=FAILED`, message prefixed with an error emoji, default
    /// context `"error"`.
    pub fn error(
        import_id: Uuid,
        note_id: Option<Uuid>,
        message: impl Into<String>,
        indent_level: i32,
    ) -> Self {
        Self {
            import_id,
            note_id,
            status: NoteStatus::Failed,
            message: format!("\u{274c} {}", message.into()),
            context: "error".to_string(),
            current_count: None,
            total_count: None,
            indent_level,
            metadata: Metadata::new(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_flips_to_completed_at_total() {
        let ev = StatusEvent::progress(Uuid::new_v4(), None, "ingredient_processing", "ingredients", 3, 3);
        assert_eq!(ev.status, NoteStatus::Completed);
        assert!(ev.message.starts_with("\u{2705}"));
        assert_eq!(ev.metadata["isComplete"], json!(true));
    }

    #[test]
    fn progress_stays_processing_below_total() {
        let ev = StatusEvent::progress(Uuid::new_v4(), None, "ingredient_processing", "ingredients", 1, 3);
        assert_eq!(ev.status, NoteStatus::Processing);
        assert_eq!(ev.message, "\u{23f3} 1/3 ingredients");
    }

    #[test]
    fn error_event_is_prefixed_and_failed() {
        let ev = StatusEvent::error(Uuid::new_v4(), None, "boom", 2);
        assert_eq!(ev.status, NoteStatus::Failed);
        assert_eq!(ev.context, "error");
        assert!(ev.message.contains("boom"));
    }
}
