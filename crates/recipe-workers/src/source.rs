// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The SOURCE worker: PROCESS_SOURCE. The single action both normalizes
//! the recipe's source url and, like INSTRUCTION and IMAGE, folds in the
//! tracker increment and categorization handoff this queue has no
//! dedicated action for.

use async_trait::async_trait;
use recipe_core::{ActionName, JobEnvelope, QueueName, StatusEvent};
use recipe_runtime::{Action, ActionFactory, ActionRunContext, AppContext, Pipeline};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// The payload threaded through the SOURCE pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceJobData {
    pub note_id: Uuid,
    pub import_id: Uuid,
    pub source_url: String,
}

struct ProcessSource;

#[async_trait]
impl Action<SourceJobData> for ProcessSource {
    fn name(&self) -> ActionName {
        ActionName::ProcessSource
    }

    async fn execute(&self, data: SourceJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<SourceJobData> {
        if data.source_url.trim().is_empty() {
            anyhow::bail!(recipe_core::RecipeError::new(recipe_core::ErrorCode::UnparsableContent, "PROCESS_SOURCE received an empty source url"));
        }

        let snapshot = deps.tracker.increment(data.note_id);
        deps.broadcaster.add_status_event_and_broadcast(StatusEvent::progress(
            data.import_id,
            Some(data.note_id),
            "source_processing",
            "sources",
            snapshot.completed_jobs.max(0) as u64,
            snapshot.total_jobs,
        ));

        if deps.tracker.check(data.note_id).is_complete {
            let payload = json!({ "note_id": data.note_id, "import_id": data.import_id });
            let mut job = JobEnvelope::new(payload, Some(data.note_id), Some(data.import_id));
            job.job_id = crate::ids::child_job_id(data.note_id, "CATEGORIZATION", 0);
            crate::ids::enqueue_idempotent(deps.broker.as_ref(), QueueName::Categorization, job)
                .await
                .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::QueueUnavailable, "PROCESS_SOURCE completion handoff failed", err))?;
        }
        Ok(data)
    }
}

/// Register the SOURCE worker's actions with `factory`.
pub fn register(factory: &mut ActionFactory<SourceJobData>) -> Result<(), recipe_runtime::FactoryError> {
    factory.register(ActionName::ProcessSource, |_deps| Box::new(ProcessSource))?;
    Ok(())
}

/// `build -> [PROCESS_SOURCE]`.
pub fn build_pipeline(
    factory: &ActionFactory<SourceJobData>,
    deps: &AppContext,
    _data: &SourceJobData,
) -> anyhow::Result<Pipeline<SourceJobData>> {
    Ok(Pipeline::new(vec![factory.create(ActionName::ProcessSource, deps)?]))
}
