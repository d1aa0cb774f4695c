// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Failure classification and the exponential-backoff policy workers
//! use to decide whether and when to retry a job.

use recipe_core::{ErrorCategory, ErrorCode, RecipeError};
use std::collections::HashMap;
use std::sync::Mutex;

/// How an action failure should be handled by `BaseWorker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// Retryable up to `max_retries`, with backoff.
    Transient,
    /// Fatal; no retry; FAILED status emitted. Covers both schema
    /// rejections and fatal external failures.
    Validation,
    /// Not a job failure: the pipeline continues with an annotated error
    /// in metadata; no FAILED status.
    Business,
    /// An opaque failure. Treated as transient once; fatal on repeat.
    Unknown,
}

/// Backoff configuration: `min(backoff_ms * 2^attempt, max_backoff_ms)`
/// plus up to 20% jitter.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { base_ms: 200, max_ms: 30_000 }
    }
}

impl BackoffPolicy {
    /// Compute the delay before retrying `attempt` (1-indexed), with
    /// jitter applied so that many simultaneously-failing jobs don't
    /// retry in lockstep.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let exp = self.base_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let capped = exp.min(self.max_ms);
        let jitter_fraction: f64 = rand::random::<f64>() * 0.2;
        let jittered = capped as f64 * (1.0 - jitter_fraction);
        jittered.round() as u64
    }
}

/// Per-`(noteId, action)` occurrence counter, used only to distinguish a
/// first `Unknown` failure (treated as transient) from a second
/// occurrence of the same class (treated as fatal).
#[derive(Default)]
pub struct ErrorHandler {
    unknown_occurrences: Mutex<HashMap<String, u32>>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a failure into one of the four kinds.
    ///
    /// `occurrence_key` should uniquely identify the `(noteId, action
    /// name)` pair so repeat `Unknown` failures of the *same* action can
    /// be escalated to fatal, without being confused with an unrelated
    /// action's first failure.
    pub fn classify(&self, err: &anyhow::Error, occurrence_key: &str) -> FailureClass {
        if let Some(recipe_err) = err.downcast_ref::<RecipeError>() {
            return match recipe_err.code.category() {
                ErrorCategory::Validation => FailureClass::Validation,
                ErrorCategory::Transient => FailureClass::Transient,
                ErrorCategory::Fatal => FailureClass::Validation,
                ErrorCategory::Business => FailureClass::Business,
                ErrorCategory::System => FailureClass::Transient,
            };
        }

        let mut occurrences = self.unknown_occurrences.lock().expect("lock poisoned");
        let count = occurrences.entry(occurrence_key.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            FailureClass::Transient
        } else {
            FailureClass::Validation
        }
    }

    /// Build the canonical `RecipeError` for a business-rule outcome,
    /// e.g. "No mapping found for notebook: X".
    pub fn business_error(code: ErrorCode, message: impl Into<String>) -> RecipeError {
        RecipeError::new(code, message)
    }
}

/// Wrap a fallible external-collaborator call. This is the single
/// entry-point wrappers must use around broker/persistence/broadcast
/// calls.
pub async fn with_error_handling<T, F, Fut>(op: F) -> anyhow::Result<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    op().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        let policy = BackoffPolicy { base_ms: 1000, max_ms: 5000 };
        let delay = policy.delay_ms(10);
        assert!(delay <= 5000);
    }

    #[test]
    fn unknown_failure_escalates_on_second_occurrence() {
        let handler = ErrorHandler::new();
        let err = anyhow::anyhow!("opaque network failure");
        let first = handler.classify(&err, "note-1:SAVE_NOTE");
        let second = handler.classify(&err, "note-1:SAVE_NOTE");
        assert_eq!(first, FailureClass::Transient);
        assert_eq!(second, FailureClass::Validation);
    }

    #[test]
    fn classified_recipe_error_maps_categories() {
        let handler = ErrorHandler::new();
        let err = anyhow::Error::new(RecipeError::new(ErrorCode::ContentEmpty, "blank"));
        assert_eq!(handler.classify(&err, "k"), FailureClass::Validation);

        let err = anyhow::Error::new(RecipeError::new(ErrorCode::UnknownNote, "missing"));
        assert_eq!(handler.classify(&err, "k2"), FailureClass::Business);
    }
}
