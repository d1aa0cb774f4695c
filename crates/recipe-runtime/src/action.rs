// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The smallest reusable unit of pipeline work.

use crate::context::AppContext;
use async_trait::async_trait;
use recipe_core::ActionName;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Per-job, per-action context threaded through `execute`: identifiers
/// for logging/broadcasting and the current attempt number.
#[derive(Debug, Clone)]
pub struct ActionRunContext {
    pub job_id: String,
    pub note_id: Option<Uuid>,
    pub import_id: Option<Uuid>,
    pub attempt_number: u32,
}

/// The result of [`Action::execute_with_timing`]: never itself an `Err`
/// — failures are captured in `error` so the worker loop can classify
/// them without unwinding.
pub struct ActionOutcome<D> {
    pub success: bool,
    pub data: Option<D>,
    pub error: Option<anyhow::Error>,
    pub duration: Duration,
}

/// A named, retryable, timed unit of work. Implementations must be
/// idempotent with respect to their own persisted effects, keyed on
/// `(note_id, action name, step identifier)`, so at-least-once delivery
/// never duplicates a row.
#[async_trait]
pub trait Action<D>: Send + Sync
where
    D: Send + 'static,
{
    /// Identity drawn from the closed [`ActionName`] enumeration.
    fn name(&self) -> ActionName;

    /// Whether a failure from this action should be retried. Default
    /// `true`; actions with no meaningful retry semantics override this.
    fn retryable(&self) -> bool {
        true
    }

    /// Tie-breaking priority within a pipeline step. Default `0`.
    fn priority(&self) -> i32 {
        0
    }

    /// Pre-execution check. A `Some` return means execution fails before
    /// any side effect runs.
    fn validate_input(&self, _data: &D) -> Option<anyhow::Error> {
        None
    }

    /// Perform the work, producing the data the next pipeline step sees.
    async fn execute(&self, data: D, deps: &AppContext, ctx: &ActionRunContext) -> anyhow::Result<D>;

    /// Wrap [`Action::execute`] with monotonic timing and
    /// [`Action::validate_input`]. Never panics; every failure path
    /// ends up in [`ActionOutcome::error`].
    async fn execute_with_timing(&self, data: D, deps: &AppContext, ctx: &ActionRunContext) -> ActionOutcome<D> {
        let start = Instant::now();
        if let Some(err) = self.validate_input(&data) {
            return ActionOutcome { success: false, data: None, error: Some(err), duration: start.elapsed() };
        }
        match self.execute(data, deps, ctx).await {
            Ok(data) => ActionOutcome { success: true, data: Some(data), error: None, duration: start.elapsed() },
            Err(err) => ActionOutcome { success: false, data: None, error: Some(err), duration: start.elapsed() },
        }
    }
}
