// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Postgres-backed [`NoteStore`], for production deployments.

use crate::{
    IngredientLineStatusUpdate, IngredientLineUpdate, IngredientReference, IngredientRecord, NoteStore,
    ParsedSegment, PersistenceError,
};
use async_trait::async_trait;
use recipe_core::{ImportRecord, Note, NoteStatus, ParsedFile};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// A note store backed by a shared Postgres connection pool. No
/// per-worker ownership of connections — each operation acquires and
/// releases from the pool.
pub struct PgNoteStore {
    pool: PgPool,
}

impl PgNoteStore {
    /// Connect to `database_url` with a small pool sized for a handful
    /// of concurrent worker handlers.
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Wrap an already-constructed pool (used by tests / shared bootstrap).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_str(status: NoteStatus) -> &'static str {
    match status {
        NoteStatus::Pending => "PENDING",
        NoteStatus::Processing => "PROCESSING",
        NoteStatus::Completed => "COMPLETED",
        NoteStatus::Failed => "FAILED",
    }
}

fn status_from_str(s: &str) -> NoteStatus {
    match s {
        "PROCESSING" => NoteStatus::Processing,
        "COMPLETED" => NoteStatus::Completed,
        "FAILED" => NoteStatus::Failed,
        _ => NoteStatus::Pending,
    }
}

#[async_trait]
impl NoteStore for PgNoteStore {
    async fn create_note(&self, import_id: Uuid, parsed: &ParsedFile) -> Result<Uuid, PersistenceError> {
        let id = Uuid::new_v4();
        let evernote = parsed.evernote_metadata.clone().unwrap_or_default();
        sqlx::query(
            "INSERT INTO notes \
             (id, import_id, title, status, source_url, notebook, evernote_source, original_created_at, evernote_tags, created_at, updated_at) \
             VALUES ($1, $2, $3, 'PROCESSING', $4, $5, $6, $7, $8, now(), now())",
        )
        .bind(id)
        .bind(import_id)
        .bind(&parsed.title)
        .bind(&parsed.source_url)
        .bind(&evernote.notebook)
        .bind(&evernote.source)
        .bind(evernote.original_created_at)
        .bind(&evernote.tags)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        Ok(id)
    }

    async fn get_note_with_evernote_metadata(&self, note_id: Uuid) -> Result<Option<Note>, PersistenceError> {
        let row = sqlx::query(
            "SELECT id, import_id, title, status, category, tags, error_summary, created_at, updated_at, \
                    notebook, evernote_source, original_created_at, evernote_tags \
             FROM notes WHERE id = $1",
        )
        .bind(note_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;

        Ok(row.map(|r| Note {
            note_id: r.get("id"),
            import_id: r.get("import_id"),
            title: r.get("title"),
            status: status_from_str(r.get::<String, _>("status").as_str()),
            category: r.get("category"),
            tags: r.get::<Vec<String>, _>("tags"),
            error_summary: r.get("error_summary"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
            notebook: r.get("notebook"),
            evernote_source: r.get("evernote_source"),
            original_created_at: r.get("original_created_at"),
            evernote_tags: r.get::<Vec<String>, _>("evernote_tags"),
        }))
    }

    async fn create_or_update_parsed_ingredient_line(
        &self,
        id: Uuid,
        update: IngredientLineUpdate,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO parsed_ingredient_lines \
             (id, note_id, block_index, line_index, reference, parse_status, parsed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
               block_index = EXCLUDED.block_index, \
               line_index = EXCLUDED.line_index, \
               reference = EXCLUDED.reference, \
               parse_status = EXCLUDED.parse_status, \
               parsed_at = EXCLUDED.parsed_at",
        )
        .bind(id)
        .bind(update.note_id)
        .bind(update.block_index as i32)
        .bind(update.line_index as i32)
        .bind(&update.reference)
        .bind(format!("{:?}", update.parse_status))
        .bind(update.parsed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        Ok(())
    }

    async fn update_parsed_ingredient_line(
        &self,
        id: Uuid,
        update: IngredientLineStatusUpdate,
    ) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE parsed_ingredient_lines SET parse_status = $1, parsed_at = $2 WHERE id = $3")
            .bind(format!("{:?}", update.parse_status))
            .bind(update.parsed_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        Ok(())
    }

    async fn replace_parsed_segments(
        &self,
        line_id: Uuid,
        segments: Vec<ParsedSegment>,
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await.map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        sqlx::query("DELETE FROM parsed_segments WHERE line_id = $1")
            .bind(line_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        for segment in segments {
            sqlx::query(
                "INSERT INTO parsed_segments (line_id, segment_index, kind, value) VALUES ($1, $2, $3, $4)",
            )
            .bind(line_id)
            .bind(segment.segment_index as i32)
            .bind(&segment.kind)
            .bind(&segment.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        }
        tx.commit().await.map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        Ok(())
    }

    async fn create_ingredient_reference(&self, reference: IngredientReference) -> Result<(), PersistenceError> {
        // ON CONFLICT DO NOTHING is the swallow-duplicates idempotence
        // the contract requires.
        sqlx::query(
            "INSERT INTO ingredient_references \
             (ingredient_id, parsed_line_id, segment_index, reference, note_id, context) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (ingredient_id, parsed_line_id, segment_index) DO NOTHING",
        )
        .bind(reference.ingredient_id)
        .bind(reference.parsed_line_id)
        .bind(reference.segment_index as i32)
        .bind(&reference.reference)
        .bind(reference.note_id)
        .bind(&reference.context)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        Ok(())
    }

    async fn find_or_create_ingredient(
        &self,
        name: &str,
        _reference: &str,
    ) -> Result<IngredientRecord, PersistenceError> {
        let lower = name.to_lowercase();
        if let Some(row) = sqlx::query(
            "SELECT id, name FROM ingredients WHERE lower(name) = $1 OR lower(singular) = $1 OR lower(plural) = $1",
        )
        .bind(&lower)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::Unavailable(e.to_string()))?
        {
            return Ok(IngredientRecord { id: row.get("id"), name: row.get("name"), is_new: false });
        }

        let id = Uuid::new_v4();
        let singular = lower.strip_suffix('s').unwrap_or(&lower).to_string();
        let plural = if lower.ends_with('s') { lower.clone() } else { format!("{lower}s") };
        sqlx::query("INSERT INTO ingredients (id, name, singular, plural) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(name)
            .bind(&singular)
            .bind(&plural)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        Ok(IngredientRecord { id, name: name.to_string(), is_new: true })
    }

    async fn get_note_title(&self, id: Uuid) -> Option<String> {
        sqlx::query("SELECT title FROM notes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .map(|row| row.get::<String, _>("title"))
    }

    async fn save_category_and_tags(
        &self,
        note_id: Uuid,
        category: Option<String>,
        tags: Vec<String>,
    ) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE notes SET category = $1, tags = $2, updated_at = now() WHERE id = $3")
            .bind(category)
            .bind(tags)
            .bind(note_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        Ok(())
    }

    async fn set_note_status(
        &self,
        note_id: Uuid,
        status: NoteStatus,
        error_summary: Option<String>,
    ) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE notes SET status = $1, error_summary = $2, updated_at = now() WHERE id = $3")
            .bind(status_str(status))
            .bind(error_summary)
            .bind(note_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        Ok(())
    }

    async fn create_import(&self, import_id: Uuid, note_ids: Vec<Uuid>) -> Result<(), PersistenceError> {
        sqlx::query("INSERT INTO imports (id, note_ids, status, created_at) VALUES ($1, $2, 'PENDING', now())")
            .bind(import_id)
            .bind(note_ids)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Rejected(e.to_string()))?;
        Ok(())
    }

    async fn get_import(&self, import_id: Uuid) -> Result<Option<ImportRecord>, PersistenceError> {
        let row = sqlx::query("SELECT id, note_ids, status, created_at FROM imports WHERE id = $1")
            .bind(import_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        Ok(row.map(|r| ImportRecord {
            import_id: r.get("id"),
            note_ids: r.get("note_ids"),
            status: status_from_str(r.get::<String, _>("status").as_str()),
            created_at: r.get("created_at"),
        }))
    }

    async fn list_notes(
        &self,
        page: i64,
        limit: i64,
        status: Option<NoteStatus>,
        search: Option<&str>,
    ) -> Result<Vec<Note>, PersistenceError> {
        let offset = (page.max(1) - 1) * limit.max(1);
        let status_filter = status.map(status_str);
        let search_pattern = search.map(|s| format!("%{s}%"));
        let rows = sqlx::query(
            "SELECT id, import_id, title, status, category, tags, error_summary, created_at, updated_at, \
                    notebook, evernote_source, original_created_at, evernote_tags \
             FROM notes \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR title ILIKE $2) \
             ORDER BY created_at DESC \
             LIMIT $3 OFFSET $4",
        )
        .bind(status_filter)
        .bind(search_pattern)
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| Note {
                note_id: r.get("id"),
                import_id: r.get("import_id"),
                title: r.get("title"),
                status: status_from_str(r.get::<String, _>("status").as_str()),
                category: r.get("category"),
                tags: r.get::<Vec<String>, _>("tags"),
                error_summary: r.get("error_summary"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
                notebook: r.get("notebook"),
                evernote_source: r.get("evernote_source"),
                original_created_at: r.get("original_created_at"),
                evernote_tags: r.get::<Vec<String>, _>("evernote_tags"),
            })
            .collect())
    }
}
