// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The narrow persistence contract plus an in-memory implementation
//! for tests and a Postgres-backed implementation for production.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recipe_core::{ImportRecord, Note, ParseStatus, ParsedFile};
use uuid::Uuid;

pub use memory::InMemoryNoteStore;
pub use postgres::PgNoteStore;

/// Input to [`NoteStore::create_or_update_parsed_ingredient_line`].
#[derive(Debug, Clone)]
pub struct IngredientLineUpdate {
    pub block_index: u32,
    pub line_index: u32,
    pub reference: String,
    pub note_id: Uuid,
    pub parse_status: ParseStatus,
    pub parsed_at: DateTime<Utc>,
}

/// Input to [`NoteStore::update_parsed_ingredient_line`].
#[derive(Debug, Clone)]
pub struct IngredientLineStatusUpdate {
    pub parse_status: ParseStatus,
    pub parsed_at: DateTime<Utc>,
}

/// One normalized ingredient segment (quantity, unit, name, ...), the
/// output of ingredient-line parsing.
#[derive(Debug, Clone)]
pub struct ParsedSegment {
    pub segment_index: u32,
    pub kind: String,
    pub value: String,
}

/// Input to [`NoteStore::create_ingredient_reference`]. Unique-constraint
/// violations on `(ingredient_id, parsed_line_id, segment_index)` are
/// swallowed by the implementation so retries stay idempotent.
#[derive(Debug, Clone)]
pub struct IngredientReference {
    pub ingredient_id: Uuid,
    pub parsed_line_id: Uuid,
    pub segment_index: u32,
    pub reference: String,
    pub note_id: Uuid,
    pub context: String,
}

impl IngredientReference {
    pub const DEFAULT_CONTEXT: &'static str = "main_ingredient";
}

/// Result of [`NoteStore::find_or_create_ingredient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientRecord {
    pub id: Uuid,
    pub name: String,
    pub is_new: bool,
}

/// Failures the persistence layer can raise. `get_note_title` never
/// raises — it reports absence as `Ok(None)` even on connection failure.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("persistence layer unavailable: {0}")]
    Unavailable(String),
    #[error("persistence layer rejected the write: {0}")]
    Rejected(String),
}

/// The narrow interface every worker action persists through.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Persist a freshly parsed file as a new note, returning its id.
    async fn create_note(&self, import_id: Uuid, parsed: &ParsedFile) -> Result<Uuid, PersistenceError>;

    /// Fetch a note together with its Evernote-style metadata, or `None`
    /// if the note is unknown.
    async fn get_note_with_evernote_metadata(&self, note_id: Uuid) -> Result<Option<Note>, PersistenceError>;

    /// Insert or update one ingredient line by id.
    async fn create_or_update_parsed_ingredient_line(
        &self,
        id: Uuid,
        update: IngredientLineUpdate,
    ) -> Result<(), PersistenceError>;

    /// Update only the parse-status fields of an existing ingredient line.
    async fn update_parsed_ingredient_line(
        &self,
        id: Uuid,
        update: IngredientLineStatusUpdate,
    ) -> Result<(), PersistenceError>;

    /// Replace all parsed segments belonging to a line, atomically from
    /// the caller's perspective.
    async fn replace_parsed_segments(
        &self,
        line_id: Uuid,
        segments: Vec<ParsedSegment>,
    ) -> Result<(), PersistenceError>;

    /// Record that an ingredient was referenced by a parsed line.
    /// Duplicate `(ingredient_id, parsed_line_id, segment_index)` calls
    /// are idempotent no-ops, not errors.
    async fn create_ingredient_reference(&self, reference: IngredientReference) -> Result<(), PersistenceError>;

    /// Find an ingredient by exact, singular, or plural form of `name`,
    /// creating one (storing both forms when `name` was plural) if none
    /// matches.
    async fn find_or_create_ingredient(
        &self,
        name: &str,
        reference: &str,
    ) -> Result<IngredientRecord, PersistenceError>;

    /// Fetch a note's title, or `None` on any failure including a
    /// connection error — this method never raises.
    async fn get_note_title(&self, id: Uuid) -> Option<String>;

    /// Record the result of DETERMINE_CATEGORY/DETERMINE_TAGS.
    async fn save_category_and_tags(
        &self,
        note_id: Uuid,
        category: Option<String>,
        tags: Vec<String>,
    ) -> Result<(), PersistenceError>;

    /// Mark a note's terminal status (COMPLETED/FAILED) and, for
    /// failures, an error summary. Backs the `GET /notes/:id` read model.
    async fn set_note_status(
        &self,
        note_id: Uuid,
        status: recipe_core::NoteStatus,
        error_summary: Option<String>,
    ) -> Result<(), PersistenceError>;

    /// Record a new import batch.
    async fn create_import(&self, import_id: Uuid, note_ids: Vec<Uuid>) -> Result<(), PersistenceError>;

    /// Fetch an import batch's current status.
    async fn get_import(&self, import_id: Uuid) -> Result<Option<ImportRecord>, PersistenceError>;

    /// List notes for `GET /notes`, newest first.
    async fn list_notes(
        &self,
        page: i64,
        limit: i64,
        status: Option<recipe_core::NoteStatus>,
        search: Option<&str>,
    ) -> Result<Vec<Note>, PersistenceError>;
}
