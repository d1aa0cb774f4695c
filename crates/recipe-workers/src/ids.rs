// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Deterministic child job ids, keyed `(noteId, kind, lineIndex)` so the
//! fan-out step is idempotent: re-running it derives the same ids.

use recipe_core::QueueName;
use recipe_queue::{Job, QueueBroker, QueueError};
use uuid::Uuid;

pub fn child_job_id(note_id: Uuid, kind: &str, line_index: u32) -> String {
    format!("{note_id}:{kind}:{line_index}")
}

/// Enqueue `job`, treating a duplicate id as success rather than a
/// failure. Child job ids are derived deterministically from
/// `(noteId, kind, lineIndex)`, so a duplicate is always a redelivered or
/// racing completion signal for work already scheduled, never new work.
pub async fn enqueue_idempotent(broker: &dyn QueueBroker, queue: QueueName, job: Job) -> Result<(), QueueError> {
    match broker.enqueue(queue, job).await {
        Ok(()) | Err(QueueError::DuplicateId(_)) => Ok(()),
        Err(err) => Err(err),
    }
}
