// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The NOTE worker: PARSE_HTML, SAVE_NOTE, SCHEDULE_IMAGES,
//! SCHEDULE_INGREDIENTS, SCHEDULE_INSTRUCTIONS, SCHEDULE_SOURCE.

use crate::ids::child_job_id;
use async_trait::async_trait;
use recipe_core::{ActionName, JobEnvelope, NoteStatus, ParsedFile, QueueName, StatusEvent};
use recipe_html::HtmlParser;
use recipe_queue::QueueBroker;
use recipe_runtime::{Action, ActionFactory, ActionRunContext, AppContext, Pipeline};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// The payload threaded through the NOTE pipeline. Starts as raw intake
/// content and accumulates the parsed file and persisted note id as each
/// action runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteJobData {
    pub content: String,
    pub import_id: Uuid,
    pub parsed: Option<ParsedFile>,
    pub note_id: Option<Uuid>,
}

impl NoteJobData {
    pub fn new(content: String, import_id: Uuid) -> Self {
        Self { content, import_id, parsed: None, note_id: None }
    }
}

fn require_parsed(data: &NoteJobData) -> anyhow::Result<&ParsedFile> {
    data.parsed.as_ref().ok_or_else(|| anyhow::anyhow!("note job reached a scheduling step before PARSE_HTML ran"))
}

fn require_note_id(data: &NoteJobData) -> anyhow::Result<Uuid> {
    data.note_id.ok_or_else(|| anyhow::anyhow!("note job reached a scheduling step before SAVE_NOTE ran"))
}

struct ParseHtml;

#[async_trait]
impl Action<NoteJobData> for ParseHtml {
    fn name(&self) -> ActionName {
        ActionName::ParseHtml
    }

    async fn execute(&self, mut data: NoteJobData, _deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<NoteJobData> {
        let parser = recipe_html::ScraperHtmlParser::new();
        let parsed = recipe_retry::with_error_handling(|| async {
            parser
                .parse(&data.content)
                .map_err(|err| anyhow::Error::new(recipe_core::RecipeError::wrap(recipe_core::ErrorCode::UnparsableContent, "PARSE_HTML failed", err)))
        })
        .await?;
        data.parsed = Some(parsed);
        Ok(data)
    }
}

struct SaveNote;

#[async_trait]
impl Action<NoteJobData> for SaveNote {
    fn name(&self) -> ActionName {
        ActionName::SaveNote
    }

    async fn execute(&self, mut data: NoteJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<NoteJobData> {
        let parsed = require_parsed(&data)?.clone();
        let note_id = deps
            .notes
            .create_note(data.import_id, &parsed)
            .await
            .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::PersistenceUnavailable, "SAVE_NOTE failed", err))?;
        data.note_id = Some(note_id);

        let total_jobs = parsed.ingredients.len() as u64
            + parsed.instructions.len() as u64
            + u64::from(parsed.image.is_some())
            + u64::from(parsed.source_url.is_some());
        deps.tracker.create(note_id, total_jobs);

        deps.broadcaster.add_status_event_and_broadcast(StatusEvent::processing(data.import_id, Some(note_id), "Note saved, scheduling fan-out"));

        // Zero-fan-out notes: nothing will ever call back into the
        // tracker, so completion must be declared here, bypassing
        // CATEGORIZATION entirely.
        if deps.tracker.check(note_id).is_complete {
            deps.notes
                .set_note_status(note_id, NoteStatus::Completed, None)
                .await
                .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::PersistenceUnavailable, "set_note_status failed", err))?;
            deps.broadcaster.add_status_event_and_broadcast(StatusEvent::completion(data.import_id, Some(note_id), "Import complete"));
        }

        Ok(data)
    }
}

struct ScheduleImages;

#[async_trait]
impl Action<NoteJobData> for ScheduleImages {
    fn name(&self) -> ActionName {
        ActionName::ScheduleImages
    }

    async fn execute(&self, data: NoteJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<NoteJobData> {
        let parsed = require_parsed(&data)?;
        let note_id = require_note_id(&data)?;
        if let Some(image_url) = parsed.image.clone() {
            let payload = json!({ "note_id": note_id, "import_id": data.import_id, "image_url": image_url });
            let mut job = JobEnvelope::new(payload, Some(note_id), Some(data.import_id));
            job.job_id = child_job_id(note_id, "IMAGE", 0);
            crate::ids::enqueue_idempotent(deps.broker.as_ref(), QueueName::Image, job)
                .await
                .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::QueueUnavailable, "SCHEDULE_IMAGES failed", err))?;
        }
        Ok(data)
    }
}

struct ScheduleIngredients;

#[async_trait]
impl Action<NoteJobData> for ScheduleIngredients {
    fn name(&self) -> ActionName {
        ActionName::ScheduleIngredients
    }

    async fn execute(&self, data: NoteJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<NoteJobData> {
        let parsed = require_parsed(&data)?;
        let note_id = require_note_id(&data)?;
        let total = parsed.ingredients.len() as u64;
        for (index, line) in parsed.ingredients.iter().enumerate() {
            let payload = json!({
                "note_id": note_id,
                "import_id": data.import_id,
                "line": line,
                "current_ingredient_index": index as u64,
                "total_ingredients": total,
            });
            let mut job = JobEnvelope::new(payload, Some(note_id), Some(data.import_id));
            job.job_id = child_job_id(note_id, "INGREDIENT", line.line_index);
            crate::ids::enqueue_idempotent(deps.broker.as_ref(), QueueName::Ingredient, job)
                .await
                .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::QueueUnavailable, "SCHEDULE_INGREDIENTS failed", err))?;
        }
        Ok(data)
    }
}

struct ScheduleInstructions;

#[async_trait]
impl Action<NoteJobData> for ScheduleInstructions {
    fn name(&self) -> ActionName {
        ActionName::ScheduleInstructions
    }

    async fn execute(&self, data: NoteJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<NoteJobData> {
        let parsed = require_parsed(&data)?;
        let note_id = require_note_id(&data)?;
        for line in &parsed.instructions {
            let payload = json!({ "note_id": note_id, "import_id": data.import_id, "line": line });
            let mut job = JobEnvelope::new(payload, Some(note_id), Some(data.import_id));
            job.job_id = child_job_id(note_id, "INSTRUCTION", line.line_index);
            crate::ids::enqueue_idempotent(deps.broker.as_ref(), QueueName::Instruction, job)
                .await
                .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::QueueUnavailable, "SCHEDULE_INSTRUCTIONS failed", err))?;
        }
        Ok(data)
    }
}

struct ScheduleSource;

#[async_trait]
impl Action<NoteJobData> for ScheduleSource {
    fn name(&self) -> ActionName {
        ActionName::ScheduleSource
    }

    async fn execute(&self, data: NoteJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<NoteJobData> {
        let parsed = require_parsed(&data)?;
        let note_id = require_note_id(&data)?;
        if let Some(source_url) = parsed.source_url.clone() {
            let payload = json!({ "note_id": note_id, "import_id": data.import_id, "source_url": source_url });
            let mut job = JobEnvelope::new(payload, Some(note_id), Some(data.import_id));
            job.job_id = child_job_id(note_id, "SOURCE", 0);
            crate::ids::enqueue_idempotent(deps.broker.as_ref(), QueueName::Source, job)
                .await
                .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::QueueUnavailable, "SCHEDULE_SOURCE failed", err))?;
        }
        Ok(data)
    }
}

/// Register the NOTE worker's actions with `factory`.
pub fn register(factory: &mut ActionFactory<NoteJobData>) -> Result<(), recipe_runtime::FactoryError> {
    factory.register(ActionName::ParseHtml, |_deps| Box::new(ParseHtml))?;
    factory.register(ActionName::SaveNote, |_deps| Box::new(SaveNote))?;
    factory.register(ActionName::ScheduleImages, |_deps| Box::new(ScheduleImages))?;
    factory.register(ActionName::ScheduleIngredients, |_deps| Box::new(ScheduleIngredients))?;
    factory.register(ActionName::ScheduleInstructions, |_deps| Box::new(ScheduleInstructions))?;
    factory.register(ActionName::ScheduleSource, |_deps| Box::new(ScheduleSource))?;
    Ok(())
}

/// `build(factory, deps, jobData) -> [PARSE_HTML, SAVE_NOTE, SCHEDULE_IMAGES,
/// SCHEDULE_INGREDIENTS, SCHEDULE_INSTRUCTIONS, SCHEDULE_SOURCE]`,
/// unconditional — the NOTE pipeline has no optional steps.
pub fn build_pipeline(
    factory: &ActionFactory<NoteJobData>,
    deps: &AppContext,
    _data: &NoteJobData,
) -> anyhow::Result<Pipeline<NoteJobData>> {
    Ok(Pipeline::new(vec![
        factory.create(ActionName::ParseHtml, deps)?,
        factory.create(ActionName::SaveNote, deps)?,
        factory.create(ActionName::ScheduleImages, deps)?,
        factory.create(ActionName::ScheduleIngredients, deps)?,
        factory.create(ActionName::ScheduleInstructions, deps)?,
        factory.create(ActionName::ScheduleSource, deps)?,
    ]))
}
