// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The job-queue orchestration core: actions, pipelines, the generic
//! worker loop, and the process-wide dependency container.

mod action;
mod broadcaster;
mod cancel;
mod context;
mod factory;
mod pipeline;
mod tracker;
mod worker;

pub use action::{Action, ActionOutcome, ActionRunContext};
pub use broadcaster::StatusBroadcaster;
pub use cancel::{CancellableJob, CancellationReason, CancellationToken};
pub use context::AppContext;
pub use factory::{ActionFactory, FactoryError};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use tracker::CompletionTracker;
pub use worker::{BaseWorker, JobValidator, NoopValidator, DEFAULT_WORKER_CONCURRENCY};
