// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The INSTRUCTION worker: FORMAT_INSTRUCTION_LINE, SAVE_INSTRUCTION_LINE.
//! This queue has no dedicated COMPLETION_STATUS action even though its
//! jobs count toward `totalJobs`, so the tracker increment and
//! categorization handoff are folded into SAVE_INSTRUCTION_LINE, the
//! pipeline's sole terminal action.

use async_trait::async_trait;
use recipe_core::{ActionName, JobEnvelope, ParsedInstructionLine, QueueName, StatusEvent};
use recipe_runtime::{Action, ActionFactory, ActionRunContext, AppContext, Pipeline};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// The payload threaded through the INSTRUCTION pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionJobData {
    pub note_id: Uuid,
    pub import_id: Uuid,
    pub line: ParsedInstructionLine,
}

struct FormatInstructionLine;

#[async_trait]
impl Action<InstructionJobData> for FormatInstructionLine {
    fn name(&self) -> ActionName {
        ActionName::FormatInstructionLine
    }

    async fn execute(&self, mut data: InstructionJobData, _deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<InstructionJobData> {
        data.line.normalized_text = Some(data.line.original_text.trim().to_string());
        Ok(data)
    }
}

struct SaveInstructionLine;

#[async_trait]
impl Action<InstructionJobData> for SaveInstructionLine {
    fn name(&self) -> ActionName {
        ActionName::SaveInstructionLine
    }

    async fn execute(&self, data: InstructionJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<InstructionJobData> {
        let snapshot = deps.tracker.increment(data.note_id);
        deps.broadcaster.add_status_event_and_broadcast(StatusEvent::progress(
            data.import_id,
            Some(data.note_id),
            "instruction_processing",
            "instructions",
            snapshot.completed_jobs.max(0) as u64,
            snapshot.total_jobs,
        ));

        if deps.tracker.check(data.note_id).is_complete {
            let payload = json!({ "note_id": data.note_id, "import_id": data.import_id });
            let mut job = JobEnvelope::new(payload, Some(data.note_id), Some(data.import_id));
            job.job_id = crate::ids::child_job_id(data.note_id, "CATEGORIZATION", 0);
            crate::ids::enqueue_idempotent(deps.broker.as_ref(), QueueName::Categorization, job)
                .await
                .map_err(|err| recipe_core::RecipeError::wrap(recipe_core::ErrorCode::QueueUnavailable, "SAVE_INSTRUCTION_LINE completion handoff failed", err))?;
        }
        Ok(data)
    }
}

/// Register the INSTRUCTION worker's actions with `factory`.
pub fn register(factory: &mut ActionFactory<InstructionJobData>) -> Result<(), recipe_runtime::FactoryError> {
    factory.register(ActionName::FormatInstructionLine, |_deps| Box::new(FormatInstructionLine))?;
    factory.register(ActionName::SaveInstructionLine, |_deps| Box::new(SaveInstructionLine))?;
    Ok(())
}

/// `build -> [FORMAT_INSTRUCTION_LINE, SAVE_INSTRUCTION_LINE]`.
pub fn build_pipeline(
    factory: &ActionFactory<InstructionJobData>,
    deps: &AppContext,
    _data: &InstructionJobData,
) -> anyhow::Result<Pipeline<InstructionJobData>> {
    Ok(Pipeline::new(vec![
        factory.create(ActionName::FormatInstructionLine, deps)?,
        factory.create(ActionName::SaveInstructionLine, deps)?,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipe_core::ParseStatus;

    fn sample_line() -> ParsedInstructionLine {
        ParsedInstructionLine {
            id: Uuid::new_v4(),
            original_text: "  Preheat the oven.  ".to_string(),
            normalized_text: None,
            line_index: 0,
            parse_status: ParseStatus::AwaitingParsing,
        }
    }

    #[tokio::test]
    async fn format_instruction_line_trims_whitespace() {
        let data = InstructionJobData { note_id: Uuid::new_v4(), import_id: Uuid::new_v4(), line: sample_line() };
        let deps = crate::test_support::test_context();
        let action = FormatInstructionLine;
        let ctx = ActionRunContext { job_id: "job-1".to_string(), note_id: None, import_id: None, attempt_number: 0 };
        let result = action.execute(data, &deps, &ctx).await.unwrap();
        assert_eq!(result.line.normalized_text, Some("Preheat the oven.".to_string()));
    }

    #[tokio::test]
    async fn save_instruction_line_increments_tracker_and_reports_progress() {
        let deps = crate::test_support::test_context();
        let note_id = Uuid::new_v4();
        deps.tracker.create(note_id, 1);
        let data = InstructionJobData { note_id, import_id: Uuid::new_v4(), line: sample_line() };
        let action = SaveInstructionLine;
        let ctx = ActionRunContext { job_id: "job-1".to_string(), note_id: Some(note_id), import_id: None, attempt_number: 0 };
        action.execute(data, &deps, &ctx).await.unwrap();
        assert!(deps.tracker.check(note_id).is_complete);
    }
}
