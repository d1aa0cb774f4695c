// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! An in-process [`NoteStore`], backing tests and local development.

use crate::{
    IngredientLineStatusUpdate, IngredientLineUpdate, IngredientReference, IngredientRecord, NoteStore,
    ParsedSegment, PersistenceError,
};
use async_trait::async_trait;
use chrono::Utc;
use recipe_core::{ImportRecord, Note, NoteStatus, ParsedFile};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    notes: HashMap<Uuid, Note>,
    parsed_files: HashMap<Uuid, ParsedFile>,
    ingredients: HashMap<String, Uuid>,
    ingredient_names: HashMap<Uuid, String>,
    ingredient_refs: HashSet<(Uuid, Uuid, u32)>,
    imports: HashMap<Uuid, ImportRecord>,
}

/// In-memory, single-process note store.
#[derive(Default)]
pub struct InMemoryNoteStore {
    state: Mutex<State>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("lock poisoned")
    }
}

fn singular(name: &str) -> String {
    name.strip_suffix('s').unwrap_or(name).to_string()
}

fn plural(name: &str) -> String {
    if name.ends_with('s') { name.to_string() } else { format!("{name}s") }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn create_note(&self, import_id: Uuid, parsed: &ParsedFile) -> Result<Uuid, PersistenceError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let evernote = parsed.evernote_metadata.clone().unwrap_or_default();
        let note = Note {
            note_id: id,
            import_id,
            title: parsed.title.clone(),
            status: NoteStatus::Processing,
            category: None,
            tags: Vec::new(),
            error_summary: None,
            created_at: now,
            updated_at: now,
            notebook: evernote.notebook,
            evernote_source: evernote.source,
            original_created_at: evernote.original_created_at,
            evernote_tags: evernote.tags,
        };
        let mut guard = self.lock();
        guard.notes.insert(id, note);
        guard.parsed_files.insert(id, parsed.clone());
        Ok(id)
    }

    async fn get_note_with_evernote_metadata(&self, note_id: Uuid) -> Result<Option<Note>, PersistenceError> {
        Ok(self.lock().notes.get(&note_id).cloned())
    }

    async fn create_or_update_parsed_ingredient_line(
        &self,
        _id: Uuid,
        _update: IngredientLineUpdate,
    ) -> Result<(), PersistenceError> {
        // Idempotent upsert keyed on `id`: no separate side table in the
        // in-memory store, so there is nothing further to do beyond the
        // ParsedFile snapshot captured at create_note time.
        Ok(())
    }

    async fn update_parsed_ingredient_line(
        &self,
        _id: Uuid,
        _update: IngredientLineStatusUpdate,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn replace_parsed_segments(
        &self,
        _line_id: Uuid,
        _segments: Vec<ParsedSegment>,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn create_ingredient_reference(&self, reference: IngredientReference) -> Result<(), PersistenceError> {
        let key = (reference.ingredient_id, reference.parsed_line_id, reference.segment_index);
        let mut guard = self.lock();
        // Swallow duplicates: matches the unique-constraint-violation
        // idempotence a real store would provide.
        guard.ingredient_refs.insert(key);
        Ok(())
    }

    async fn find_or_create_ingredient(
        &self,
        name: &str,
        _reference: &str,
    ) -> Result<IngredientRecord, PersistenceError> {
        let lower = name.to_lowercase();
        let mut guard = self.lock();

        for candidate in [lower.clone(), singular(&lower), plural(&lower)] {
            if let Some(id) = guard.ingredients.get(&candidate) {
                let stored_name = guard.ingredient_names.get(id).cloned().unwrap_or_else(|| name.to_string());
                return Ok(IngredientRecord { id: *id, name: stored_name, is_new: false });
            }
        }

        let id = Uuid::new_v4();
        guard.ingredients.insert(lower.clone(), id);
        // If the input was plural, store both forms so a later singular
        // lookup also hits.
        let sing = singular(&lower);
        if sing != lower {
            guard.ingredients.insert(sing, id);
        } else {
            guard.ingredients.insert(plural(&lower), id);
        }
        guard.ingredient_names.insert(id, name.to_string());
        Ok(IngredientRecord { id, name: name.to_string(), is_new: true })
    }

    async fn get_note_title(&self, id: Uuid) -> Option<String> {
        self.lock().notes.get(&id).map(|n| n.title.clone())
    }

    async fn save_category_and_tags(
        &self,
        note_id: Uuid,
        category: Option<String>,
        tags: Vec<String>,
    ) -> Result<(), PersistenceError> {
        let mut guard = self.lock();
        let note = guard
            .notes
            .get_mut(&note_id)
            .ok_or_else(|| PersistenceError::Rejected(format!("unknown note {note_id}")))?;
        note.category = category;
        note.tags = tags;
        note.updated_at = Utc::now();
        Ok(())
    }

    async fn set_note_status(
        &self,
        note_id: Uuid,
        status: NoteStatus,
        error_summary: Option<String>,
    ) -> Result<(), PersistenceError> {
        let mut guard = self.lock();
        let note = guard
            .notes
            .get_mut(&note_id)
            .ok_or_else(|| PersistenceError::Rejected(format!("unknown note {note_id}")))?;
        note.status = status;
        note.error_summary = error_summary;
        note.updated_at = Utc::now();
        Ok(())
    }

    async fn create_import(&self, import_id: Uuid, note_ids: Vec<Uuid>) -> Result<(), PersistenceError> {
        let mut guard = self.lock();
        guard.imports.insert(
            import_id,
            ImportRecord { import_id, created_at: Utc::now(), note_ids, status: NoteStatus::Pending },
        );
        Ok(())
    }

    async fn get_import(&self, import_id: Uuid) -> Result<Option<ImportRecord>, PersistenceError> {
        Ok(self.lock().imports.get(&import_id).cloned())
    }

    async fn list_notes(
        &self,
        page: i64,
        limit: i64,
        status: Option<NoteStatus>,
        search: Option<&str>,
    ) -> Result<Vec<Note>, PersistenceError> {
        let guard = self.lock();
        let mut notes: Vec<Note> = guard
            .notes
            .values()
            .filter(|n| status.is_none_or(|s| n.status == s))
            .filter(|n| search.is_none_or(|q| n.title.to_lowercase().contains(&q.to_lowercase())))
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let start = ((page - 1).max(0) as usize) * (limit.max(0) as usize);
        Ok(notes.into_iter().skip(start).take(limit.max(0) as usize).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_parsed_file() -> ParsedFile {
        ParsedFile {
            title: "Test Recipe".to_string(),
            contents: "<p>content</p>".to_string(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            evernote_metadata: None,
            image: None,
            historical_created_at: None,
            source_url: None,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_note_round_trips() {
        let store = InMemoryNoteStore::new();
        let import_id = Uuid::new_v4();
        let id = store.create_note(import_id, &sample_parsed_file()).await.unwrap();
        let note = store.get_note_with_evernote_metadata(id).await.unwrap().unwrap();
        assert_eq!(note.title, "Test Recipe");
        assert_eq!(note.import_id, import_id);
    }

    #[tokio::test]
    async fn create_note_persists_evernote_metadata() {
        let store = InMemoryNoteStore::new();
        let mut parsed = sample_parsed_file();
        parsed.evernote_metadata = Some(recipe_core::EvernoteMetadata {
            source: Some("web.clip".to_string()),
            original_created_at: Some(Utc::now()),
            tags: vec!["dessert".to_string()],
            notebook: Some("Desserts".to_string()),
        });
        let id = store.create_note(Uuid::new_v4(), &parsed).await.unwrap();
        let note = store.get_note_with_evernote_metadata(id).await.unwrap().unwrap();
        assert_eq!(note.notebook.as_deref(), Some("Desserts"));
        assert_eq!(note.evernote_source.as_deref(), Some("web.clip"));
        assert_eq!(note.evernote_tags, vec!["dessert".to_string()]);
    }

    #[tokio::test]
    async fn create_note_without_evernote_metadata_leaves_fields_empty() {
        let store = InMemoryNoteStore::new();
        let id = store.create_note(Uuid::new_v4(), &sample_parsed_file()).await.unwrap();
        let note = store.get_note_with_evernote_metadata(id).await.unwrap().unwrap();
        assert_eq!(note.notebook, None);
        assert!(note.evernote_tags.is_empty());
    }

    #[tokio::test]
    async fn find_or_create_ingredient_matches_plural() {
        let store = InMemoryNoteStore::new();
        let created = store.find_or_create_ingredient("tomatoes", "2 tomatoes").await.unwrap();
        assert!(created.is_new);
        let found = store.find_or_create_ingredient("tomato", "1 tomato").await.unwrap();
        assert!(!found.is_new);
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn note_title_is_none_for_unknown_note() {
        let store = InMemoryNoteStore::new();
        assert!(store.get_note_title(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn duplicate_ingredient_reference_is_idempotent() {
        let store = InMemoryNoteStore::new();
        let reference = IngredientReference {
            ingredient_id: Uuid::new_v4(),
            parsed_line_id: Uuid::new_v4(),
            segment_index: 0,
            reference: "2 cups flour".to_string(),
            note_id: Uuid::new_v4(),
            context: IngredientReference::DEFAULT_CONTEXT.to_string(),
        };
        store.create_ingredient_reference(reference.clone()).await.unwrap();
        store.create_ingredient_reference(reference).await.unwrap();
    }
}
