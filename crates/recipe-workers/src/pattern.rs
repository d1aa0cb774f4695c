// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The PATTERN_TRACKING worker: RECORD_PATTERN. A side channel fed by
//! TRACK_PATTERN jobs off the INGREDIENT pipeline; it never
//! touches the completion tracker and its failures never block a note's
//! completion.

use async_trait::async_trait;
use recipe_runtime::{Action, ActionFactory, ActionRunContext, AppContext, Pipeline};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The payload threaded through the PATTERN_TRACKING pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternJobData {
    pub note_id: Uuid,
    pub import_id: Uuid,
    pub reference: String,
}

struct RecordPattern;

#[async_trait]
impl Action<PatternJobData> for RecordPattern {
    fn name(&self) -> recipe_core::ActionName {
        recipe_core::ActionName::RecordPattern
    }

    fn retryable(&self) -> bool {
        // A dropped pattern observation costs the system nothing a note
        // depends on; retrying it just delays the queue.
        false
    }

    async fn execute(&self, data: PatternJobData, deps: &AppContext, _ctx: &ActionRunContext) -> anyhow::Result<PatternJobData> {
        let title = deps.notes.get_note_title(data.note_id).await;
        tracing::debug!(
            target: "recipe.pipeline",
            note_id = %data.note_id,
            note_title = title.as_deref().unwrap_or("<unknown>"),
            reference = %data.reference,
            "recorded ingredient reference pattern"
        );
        Ok(data)
    }
}

/// Register the PATTERN_TRACKING worker's actions with `factory`.
pub fn register(factory: &mut ActionFactory<PatternJobData>) -> Result<(), recipe_runtime::FactoryError> {
    factory.register(recipe_core::ActionName::RecordPattern, |_deps| Box::new(RecordPattern))?;
    Ok(())
}

/// `build -> [RECORD_PATTERN]`.
pub fn build_pipeline(
    factory: &ActionFactory<PatternJobData>,
    deps: &AppContext,
    _data: &PatternJobData,
) -> anyhow::Result<Pipeline<PatternJobData>> {
    Ok(Pipeline::new(vec![factory.create(recipe_core::ActionName::RecordPattern, deps)?]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_pattern_is_not_retryable() {
        assert!(!RecordPattern.retryable());
    }

    #[tokio::test]
    async fn record_pattern_succeeds_even_for_unknown_note() {
        let deps = crate::test_support::test_context();
        let data = PatternJobData { note_id: Uuid::new_v4(), import_id: Uuid::new_v4(), reference: "2 cups flour".to_string() };
        let ctx = ActionRunContext { job_id: "job-1".to_string(), note_id: None, import_id: None, attempt_number: 0 };
        assert!(RecordPattern.execute(data, &deps, &ctx).await.is_ok());
    }
}
