// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The INGREDIENT worker: [UPDATE_INGREDIENT_COUNT?], PARSE_INGREDIENT_LINE,
//! SAVE_INGREDIENT_LINE, TRACK_PATTERN, COMPLETION_STATUS,
//! SCHEDULE_CATEGORIZATION_AFTER_COMPLETION.

use async_trait::async_trait;
use chrono::Utc;
use recipe_core::{ActionName, JobEnvelope, ParseStatus, ParsedIngredientLine, QueueName, StatusEvent};
use recipe_persistence::{IngredientLineUpdate, IngredientReference};
use recipe_runtime::{Action, ActionFactory, ActionRunContext, AppContext, Pipeline};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// The payload threaded through the INGREDIENT pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientJobData {
    pub note_id: Uuid,
    pub import_id: Uuid,
    pub line: ParsedIngredientLine,
    pub current_ingredient_index: Option<u64>,
    pub total_ingredients: Option<u64>,
}

struct UpdateIngredientCount;

#[async_trait]
impl Action<IngredientJobData> for UpdateIngredientCount {
    fn name(&self) -> ActionName {
        ActionName::UpdateIngredientCount
    }

    async fn execute(&self, data: IngredientJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<IngredientJobData> {
        if let (Some(current), Some(total)) = (data.current_ingredient_index, data.total_ingredients) {
            deps.broadcaster.add_status_event_and_broadcast(StatusEvent::progress(
                data.import_id,
                Some(data.note_id),
                "ingredient_processing",
                "ingredients",
                current,
                total,
            ));
        }
        Ok(data)
    }
}

struct ParseIngredientLine;

#[async_trait]
impl Action<IngredientJobData> for ParseIngredientLine {
    fn name(&self) -> ActionName {
        ActionName::ParseIngredientLine
    }

    async fn execute(&self, mut data: IngredientJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<IngredientJobData> {
        let (name, rest) = split_reference(&data.line.reference);
        match deps.notes.find_or_create_ingredient(&name, &data.line.reference).await {
            Ok(record) => {
                let reference = IngredientReference {
                    ingredient_id: record.id,
                    parsed_line_id: data.line.id,
                    segment_index: 0,
                    reference: rest.unwrap_or_default(),
                    note_id: data.note_id,
                    context: IngredientReference::DEFAULT_CONTEXT.to_string(),
                };
                deps.notes
                    .create_ingredient_reference(reference)
                    .await
                    .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::PersistenceUnavailable, "PARSE_INGREDIENT_LINE failed", err))?;
                data.line.parse_status = ParseStatus::CompletedSuccessfully;
            }
            Err(err) => {
                data.line.parse_status = ParseStatus::CompletedWithError;
                tracing::debug!(target: "recipe.pipeline", error = %err, "ingredient line parsing fell back to raw text");
            }
        }
        Ok(data)
    }
}

/// Split `"2 cups flour, diced"` into an ingredient name guess and the
/// remainder. This workspace's HTML parser is a stub; a real
/// ingredient-line parser would live here instead of this heuristic.
fn split_reference(reference: &str) -> (String, Option<String>) {
    let trimmed = reference.trim();
    let mut parts = trimmed.rsplitn(2, ' ');
    let last_word = parts.next().unwrap_or(trimmed).to_string();
    (last_word, Some(trimmed.to_string()))
}

struct SaveIngredientLine;

#[async_trait]
impl Action<IngredientJobData> for SaveIngredientLine {
    fn name(&self) -> ActionName {
        ActionName::SaveIngredientLine
    }

    async fn execute(&self, data: IngredientJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<IngredientJobData> {
        let update = IngredientLineUpdate {
            block_index: data.line.block_index,
            line_index: data.line.line_index,
            reference: data.line.reference.clone(),
            note_id: data.note_id,
            parse_status: data.line.parse_status,
            parsed_at: Utc::now(),
        };
        deps.notes
            .create_or_update_parsed_ingredient_line(data.line.id, update)
            .await
            .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::PersistenceUnavailable, "SAVE_INGREDIENT_LINE failed", err))?;
        Ok(data)
    }
}

struct TrackPattern;

#[async_trait]
impl Action<IngredientJobData> for TrackPattern {
    fn name(&self) -> ActionName {
        ActionName::TrackPattern
    }

    async fn execute(&self, data: IngredientJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<IngredientJobData> {
        // Side-channel fan-out: PATTERN_TRACKING does not participate in
        // the note's completion count.
        let payload = json!({
            "note_id": data.note_id,
            "import_id": data.import_id,
            "reference": data.line.reference,
        });
        let mut job = JobEnvelope::new(payload, Some(data.note_id), Some(data.import_id));
        job.job_id = crate::ids::child_job_id(data.note_id, "PATTERN", data.line.line_index);
        crate::ids::enqueue_idempotent(deps.broker.as_ref(), QueueName::PatternTracking, job)
            .await
            .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::QueueUnavailable, "TRACK_PATTERN failed", err))?;
        Ok(data)
    }
}

struct CompletionStatus;

#[async_trait]
impl Action<IngredientJobData> for CompletionStatus {
    fn name(&self) -> ActionName {
        ActionName::CompletionStatus
    }

    async fn execute(&self, data: IngredientJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<IngredientJobData> {
        let snapshot = deps.tracker.increment(data.note_id);
        deps.broadcaster.add_status_event_and_broadcast(StatusEvent::progress(
            data.import_id,
            Some(data.note_id),
            "ingredient_processing",
            "ingredients",
            snapshot.completed_jobs.max(0) as u64,
            snapshot.total_jobs,
        ));
        Ok(data)
    }
}

struct ScheduleCategorizationAfterCompletion;

#[async_trait]
impl Action<IngredientJobData> for ScheduleCategorizationAfterCompletion {
    fn name(&self) -> ActionName {
        ActionName::ScheduleCategorizationAfterCompletion
    }

    async fn execute(&self, data: IngredientJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<IngredientJobData> {
        if deps.tracker.check(data.note_id).is_complete {
            let payload = json!({ "note_id": data.note_id, "import_id": data.import_id });
            let mut job = JobEnvelope::new(payload, Some(data.note_id), Some(data.import_id));
            job.job_id = crate::ids::child_job_id(data.note_id, "CATEGORIZATION", 0);
            crate::ids::enqueue_idempotent(deps.broker.as_ref(), QueueName::Categorization, job)
                .await
                .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::QueueUnavailable, "SCHEDULE_CATEGORIZATION_AFTER_COMPLETION failed", err))?;
        }
        Ok(data)
    }
}

/// Register the INGREDIENT worker's actions with `factory`.
pub fn register(factory: &mut ActionFactory<IngredientJobData>) -> Result<(), recipe_runtime::FactoryError> {
    factory.register(ActionName::UpdateIngredientCount, |_deps| Box::new(UpdateIngredientCount))?;
    factory.register(ActionName::ParseIngredientLine, |_deps| Box::new(ParseIngredientLine))?;
    factory.register(ActionName::SaveIngredientLine, |_deps| Box::new(SaveIngredientLine))?;
    factory.register(ActionName::TrackPattern, |_deps| Box::new(TrackPattern))?;
    factory.register(ActionName::CompletionStatus, |_deps| Box::new(CompletionStatus))?;
    factory.register(ActionName::ScheduleCategorizationAfterCompletion, |_deps| {
        Box::new(ScheduleCategorizationAfterCompletion)
    })?;
    Ok(())
}

/// `build` inserts UPDATE_INGREDIENT_COUNT only when both
/// `currentIngredientIndex` and `totalIngredients` are present.
pub fn build_pipeline(
    factory: &ActionFactory<IngredientJobData>,
    deps: &AppContext,
    data: &IngredientJobData,
) -> anyhow::Result<Pipeline<IngredientJobData>> {
    let mut steps = Vec::new();
    if data.current_ingredient_index.is_some() && data.total_ingredients.is_some() {
        steps.push(factory.create(ActionName::UpdateIngredientCount, deps)?);
    }
    steps.push(factory.create(ActionName::ParseIngredientLine, deps)?);
    steps.push(factory.create(ActionName::SaveIngredientLine, deps)?);
    steps.push(factory.create(ActionName::TrackPattern, deps)?);
    steps.push(factory.create(ActionName::CompletionStatus, deps)?);
    steps.push(factory.create(ActionName::ScheduleCategorizationAfterCompletion, deps)?);
    Ok(Pipeline::new(steps))
}
