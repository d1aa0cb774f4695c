// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The IMAGE worker: PROCESS_IMAGE, SAVE_IMAGE. As with INSTRUCTION, this
//! queue's jobs count toward `totalJobs` without a dedicated
//! COMPLETION_STATUS action, so the tracker increment and categorization
//! handoff are folded into SAVE_IMAGE.

use async_trait::async_trait;
use recipe_core::{ActionName, JobEnvelope, QueueName, StatusEvent};
use recipe_runtime::{Action, ActionFactory, ActionRunContext, AppContext, Pipeline};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// The payload threaded through the IMAGE pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageJobData {
    pub note_id: Uuid,
    pub import_id: Uuid,
    pub image_url: String,
    pub stored_path: Option<String>,
}

struct ProcessImage;

#[async_trait]
impl Action<ImageJobData> for ProcessImage {
    fn name(&self) -> ActionName {
        ActionName::ProcessImage
    }

    async fn execute(&self, mut data: ImageJobData, _deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<ImageJobData> {
        if data.image_url.trim().is_empty() {
            anyhow::bail!(recipe_core::RecipeError::new(recipe_core::ErrorCode::UnparsableContent, "PROCESS_IMAGE received an empty image url"));
        }
        data.stored_path = Some(format!("notes/{}/image", data.note_id));
        Ok(data)
    }
}

struct SaveImage;

#[async_trait]
impl Action<ImageJobData> for SaveImage {
    fn name(&self) -> ActionName {
        ActionName::SaveImage
    }

    async fn execute(&self, data: ImageJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<ImageJobData> {
        let snapshot = deps.tracker.increment(data.note_id);
        deps.broadcaster.add_status_event_and_broadcast(StatusEvent::progress(
            data.import_id,
            Some(data.note_id),
            "image_processing",
            "images",
            snapshot.completed_jobs.max(0) as u64,
            snapshot.total_jobs,
        ));

        if deps.tracker.check(data.note_id).is_complete {
            let payload = json!({ "note_id": data.note_id, "import_id": data.import_id });
            let mut job = JobEnvelope::new(payload, Some(data.note_id), Some(data.import_id));
            job.job_id = crate::ids::child_job_id(data.note_id, "CATEGORIZATION", 0);
            crate::ids::enqueue_idempotent(deps.broker.as_ref(), QueueName::Categorization, job)
                .await
                .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::QueueUnavailable, "SAVE_IMAGE completion handoff failed", err))?;
        }
        Ok(data)
    }
}

/// Register the IMAGE worker's actions with `factory`.
pub fn register(factory: &mut ActionFactory<ImageJobData>) -> Result<(), recipe_runtime::FactoryError> {
    factory.register(ActionName::ProcessImage, |_deps| Box::new(ProcessImage))?;
    factory.register(ActionName::SaveImage, |_deps| Box::new(SaveImage))?;
    Ok(())
}

/// `build -> [PROCESS_IMAGE, SAVE_IMAGE]`.
pub fn build_pipeline(
    factory: &ActionFactory<ImageJobData>,
    deps: &AppContext,
    _data: &ImageJobData,
) -> anyhow::Result<Pipeline<ImageJobData>> {
    Ok(Pipeline::new(vec![
        factory.create(ActionName::ProcessImage, deps)?,
        factory.create(ActionName::SaveImage, deps)?,
    ]))
}
