// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The queue broker contract plus an in-memory implementation for
//! tests/dev and a Redis-backed implementation for production.
//!
//! The wire protocol a durable broker would use is explicitly out of
//! scope; what matters here is the four-operation contract every worker
//! is written against.

mod memory;
mod redis_broker;

use async_trait::async_trait;
use recipe_core::{JobEnvelope, QueueName};
use thiserror::Error;

pub use memory::InMemoryBroker;
pub use redis_broker::RedisBroker;

/// A job envelope carrying an untyped JSON payload, the shape every broker
/// implementation moves over the wire. Concrete workers deserialize
/// `data` into their own payload type after dequeue.
pub type Job = JobEnvelope<serde_json::Value>;

/// Failures a broker implementation can raise.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The broker's backing store could not be reached.
    #[error("queue unavailable: {0}")]
    Unavailable(String),
    /// A job with this id was already present (duplicate enqueue).
    #[error("duplicate job id: {0}")]
    DuplicateId(String),
    /// `ack`/`nack` referenced a job id the broker does not know about.
    #[error("unknown job id: {0}")]
    UnknownJob(String),
}

/// Seven logical queues, each supporting `enqueue`/`dequeue`/`ack`/`nack`
/// with at-least-once delivery. All actions are written to be idempotent
/// accordingly.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Enqueue a job onto `queue`.
    async fn enqueue(&self, queue: QueueName, job: Job) -> Result<(), QueueError>;

    /// Dequeue the next job from `queue`, if any is ready. Returns `None`
    /// rather than blocking; callers implement backoff between polls.
    async fn dequeue(&self, queue: QueueName) -> Result<Option<Job>, QueueError>;

    /// Acknowledge successful (or fatally-failed) processing of a job,
    /// removing it from the broker's in-flight set.
    async fn ack(&self, queue: QueueName, job_id: &str) -> Result<(), QueueError>;

    /// Return a job to `queue` for redelivery after `retry_after_ms`.
    async fn nack(&self, queue: QueueName, job_id: &str, retry_after_ms: u64) -> Result<(), QueueError>;
}
