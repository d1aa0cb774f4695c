// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The CATEGORIZATION worker: DETERMINE_CATEGORY, SAVE_CATEGORY,
//! DETERMINE_TAGS, SAVE_TAGS. This pipeline is the note's terminal step:
//! SAVE_TAGS marks the note COMPLETED and broadcasts the final status
//! event.

use crate::category::category_for_notebook;
use async_trait::async_trait;
use recipe_core::{ActionName, ErrorCode, NoteStatus, RecipeError, StatusEvent};
use recipe_runtime::{Action, ActionFactory, ActionRunContext, AppContext, Pipeline};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The payload threaded through the CATEGORIZATION pipeline. `notebook`
/// starts unset and is filled in by DETERMINE_CATEGORY from the persisted
/// note, not from the enqueuing job's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationJobData {
    pub note_id: Uuid,
    pub import_id: Uuid,
    #[serde(default)]
    pub notebook: Option<String>,
    pub category: Option<String>,
    pub category_determination_reason: Option<String>,
    pub tags: Vec<String>,
}

struct DetermineCategory;

#[async_trait]
impl Action<CategorizationJobData> for DetermineCategory {
    fn name(&self) -> ActionName {
        ActionName::DetermineCategory
    }

    async fn execute(&self, mut data: CategorizationJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<CategorizationJobData> {
        let note = deps
            .notes
            .get_note_with_evernote_metadata(data.note_id)
            .await
            .map_err(|err| RecipeError::wrap(ErrorCode::PersistenceUnavailable, "DETERMINE_CATEGORY failed", err))?
            .ok_or_else(|| RecipeError::new(ErrorCode::UnknownNote, format!("note {} not found", data.note_id)))?;

        data.notebook = note.notebook.clone();
        match note.notebook.as_deref() {
            Some(notebook) => match category_for_notebook(notebook) {
                Some(category) => {
                    data.category = Some(category.to_string());
                    data.category_determination_reason = None;
                }
                None => {
                    // Business-rule miss, never a fatal error: the
                    // note still reaches COMPLETED with no category.
                    data.category = None;
                    data.category_determination_reason = Some(format!("No mapping found for notebook: {notebook}"));
                }
            },
            None => {
                data.category = None;
                data.category_determination_reason = Some("No notebook recorded for note".to_string());
            }
        }
        Ok(data)
    }
}

struct SaveCategory;

#[async_trait]
impl Action<CategorizationJobData> for SaveCategory {
    fn name(&self) -> ActionName {
        ActionName::SaveCategory
    }

    async fn execute(&self, data: CategorizationJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<CategorizationJobData> {
        deps.notes
            .save_category_and_tags(data.note_id, data.category.clone(), Vec::new())
            .await
            .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::PersistenceUnavailable, "SAVE_CATEGORY failed", err))?;
        Ok(data)
    }
}

struct DetermineTags;

#[async_trait]
impl Action<CategorizationJobData> for DetermineTags {
    fn name(&self) -> ActionName {
        ActionName::DetermineTags
    }

    async fn execute(&self, mut data: CategorizationJobData, _deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<CategorizationJobData> {
        let mut tags = Vec::new();
        if let Some(category) = &data.category {
            tags.push(category.to_lowercase());
        }
        if let Some(notebook) = &data.notebook {
            tags.push(notebook.trim().to_lowercase());
        }
        tags.sort();
        tags.dedup();
        data.tags = tags;
        Ok(data)
    }
}

struct SaveTags;

#[async_trait]
impl Action<CategorizationJobData> for SaveTags {
    fn name(&self) -> ActionName {
        ActionName::SaveTags
    }

    async fn execute(&self, data: CategorizationJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<CategorizationJobData> {
        deps.notes
            .save_category_and_tags(data.note_id, data.category.clone(), data.tags.clone())
            .await
            .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::PersistenceUnavailable, "SAVE_TAGS failed", err))?;

        deps.notes
            .set_note_status(data.note_id, NoteStatus::Completed, None)
            .await
            .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::PersistenceUnavailable, "set_note_status failed", err))?;

        deps.broadcaster.add_status_event_and_broadcast(StatusEvent::completion(data.import_id, Some(data.note_id), "Import complete"));

        Ok(data)
    }
}

/// Register the CATEGORIZATION worker's actions with `factory`.
pub fn register(factory: &mut ActionFactory<CategorizationJobData>) -> Result<(), recipe_runtime::FactoryError> {
    factory.register(ActionName::DetermineCategory, |_deps| Box::new(DetermineCategory))?;
    factory.register(ActionName::SaveCategory, |_deps| Box::new(SaveCategory))?;
    factory.register(ActionName::DetermineTags, |_deps| Box::new(DetermineTags))?;
    factory.register(ActionName::SaveTags, |_deps| Box::new(SaveTags))?;
    Ok(())
}

/// `build -> [DETERMINE_CATEGORY, SAVE_CATEGORY, DETERMINE_TAGS, SAVE_TAGS]`.
pub fn build_pipeline(
    factory: &ActionFactory<CategorizationJobData>,
    deps: &AppContext,
    _data: &CategorizationJobData,
) -> anyhow::Result<Pipeline<CategorizationJobData>> {
    Ok(Pipeline::new(vec![
        factory.create(ActionName::DetermineCategory, deps)?,
        factory.create(ActionName::SaveCategory, deps)?,
        factory.create(ActionName::DetermineTags, deps)?,
        factory.create(ActionName::SaveTags, deps)?,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ActionRunContext {
        ActionRunContext { job_id: "job-1".to_string(), note_id: None, import_id: None, attempt_number: 0 }
    }

    fn base_data(note_id: Uuid) -> CategorizationJobData {
        CategorizationJobData {
            note_id,
            import_id: Uuid::new_v4(),
            notebook: None,
            category: None,
            category_determination_reason: None,
            tags: Vec::new(),
        }
    }

    fn parsed_file_with_notebook(notebook: Option<&str>) -> recipe_core::ParsedFile {
        recipe_core::ParsedFile {
            title: "Test".to_string(),
            contents: "<html></html>".to_string(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            evernote_metadata: Some(recipe_core::EvernoteMetadata {
                notebook: notebook.map(str::to_string),
                ..Default::default()
            }),
            image: None,
            historical_created_at: None,
            source_url: None,
        }
    }

    #[tokio::test]
    async fn determine_category_maps_known_notebook() {
        let deps = crate::test_support::test_context();
        let note_id = deps.notes.create_note(Uuid::new_v4(), &parsed_file_with_notebook(Some("Desserts"))).await.unwrap();
        let result = DetermineCategory.execute(base_data(note_id), &deps, &ctx()).await.unwrap();
        assert_eq!(result.category, Some("Dessert".to_string()));
        assert!(result.category_determination_reason.is_none());
    }

    #[tokio::test]
    async fn determine_category_annotates_unknown_notebook_as_business_rule_miss() {
        let deps = crate::test_support::test_context();
        let note_id = deps.notes.create_note(Uuid::new_v4(), &parsed_file_with_notebook(Some("Obscure Notebook"))).await.unwrap();
        let result = DetermineCategory.execute(base_data(note_id), &deps, &ctx()).await.unwrap();
        assert_eq!(result.category, None);
        assert_eq!(result.category_determination_reason, Some("No mapping found for notebook: Obscure Notebook".to_string()));
    }

    #[tokio::test]
    async fn determine_category_raises_unknown_note_for_missing_note() {
        let deps = crate::test_support::test_context();
        let data = base_data(Uuid::new_v4());
        let err = DetermineCategory.execute(data, &deps, &ctx()).await.unwrap_err();
        let recipe_err = err.downcast_ref::<RecipeError>().expect("expected a RecipeError");
        assert_eq!(recipe_err.code, ErrorCode::UnknownNote);
    }

    #[tokio::test]
    async fn save_tags_marks_note_completed() {
        let deps = crate::test_support::test_context();
        let parsed = recipe_core::ParsedFile {
            title: "Test".to_string(),
            contents: "<html></html>".to_string(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            evernote_metadata: None,
            image: None,
            historical_created_at: None,
            source_url: None,
        };
        let note_id = deps.notes.create_note(Uuid::new_v4(), &parsed).await.unwrap();
        let mut data = base_data(note_id);
        data.category = Some("Dessert".to_string());
        data.tags = vec!["dessert".to_string()];
        SaveTags.execute(data, &deps, &ctx()).await.unwrap();
    }
}
