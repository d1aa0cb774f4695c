// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The generic per-queue job loop.

use crate::action::ActionRunContext;
use crate::cancel::{CancellableJob, CancellationReason};
use crate::context::AppContext;
use crate::factory::ActionFactory;
use crate::pipeline::PipelineBuilder;
use recipe_core::{QueueName, StatusEvent};
use recipe_retry::{BackoffPolicy, FailureClass};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Validates a deserialized job payload against its stage's schema
/// before any pipeline step runs. Returning `Err` is a fatal,
/// non-retryable failure.
pub trait JobValidator<D>: Send + Sync {
    fn validate(&self, data: &D) -> Result<(), String>;
}

/// A validator that always accepts — used by workers whose payload has
/// no stage-boundary constraints beyond what deserialization enforces.
pub struct NoopValidator;
impl<D> JobValidator<D> for NoopValidator {
    fn validate(&self, _data: &D) -> Result<(), String> {
        Ok(())
    }
}

/// How many job handlers run concurrently for one queue. Default 1.
pub const DEFAULT_WORKER_CONCURRENCY: usize = 1;

/// How long `dequeue` is polled when a queue is empty, before trying again.
const EMPTY_QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The generic job loop: dequeue -> validate -> build pipeline -> execute
/// sequentially -> ack/nack.
pub struct BaseWorker<D> {
    queue: QueueName,
    deps: AppContext,
    factory: ActionFactory<D>,
    build_pipeline: PipelineBuilder<D>,
    validator: Box<dyn JobValidator<D>>,
    backoff: BackoffPolicy,
    concurrency: usize,
}

impl<D> BaseWorker<D>
where
    D: Send + Sync + Clone + Serialize + DeserializeOwned + 'static,
{
    pub fn new(
        queue: QueueName,
        deps: AppContext,
        factory: ActionFactory<D>,
        build_pipeline: PipelineBuilder<D>,
        validator: Box<dyn JobValidator<D>>,
    ) -> Self {
        Self {
            queue,
            deps,
            factory,
            build_pipeline,
            validator,
            backoff: BackoffPolicy::default(),
            concurrency: DEFAULT_WORKER_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run the dequeue loop until `shutdown` resolves. Up to `concurrency`
    /// jobs are handled at once; within a single job, execution is
    /// strictly sequential.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        loop {
            if *shutdown.borrow() {
                return;
            }

            let dequeued = self.deps.broker.dequeue(self.queue).await;
            let job = match dequeued {
                Ok(Some(job)) => job,
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(EMPTY_QUEUE_POLL_INTERVAL) => continue,
                        _ = shutdown.changed() => continue,
                    }
                }
                Err(err) => {
                    warn!(target: "recipe.worker", queue = %self.queue, error = %err, "dequeue failed");
                    tokio::time::sleep(EMPTY_QUEUE_POLL_INTERVAL).await;
                    continue;
                }
            };

            let permit = permits.clone().acquire_owned().await.expect("semaphore never closed");
            let this = self.clone();
            tokio::spawn(async move {
                this.handle_job(job).await;
                drop(permit);
            });
        }
    }

    async fn handle_job(&self, job: recipe_queue::Job) {
        let run_ctx = ActionRunContext {
            job_id: job.job_id.clone(),
            note_id: job.note_id,
            import_id: job.import_id,
            attempt_number: job.attempt_number,
        };

        let data: D = match serde_json::from_value(job.data.clone()) {
            Ok(data) => data,
            Err(err) => {
                self.fail_job(&job, &run_ctx, &format!("job payload did not match schema: {err}")).await;
                return;
            }
        };

        if let Err(message) = self.validator.validate(&data) {
            self.fail_job(&job, &run_ctx, &message).await;
            return;
        }

        let pipeline = match (self.build_pipeline)(&self.factory, &self.deps, &data) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                self.fail_job(&job, &run_ctx, &format!("failed to build pipeline: {err}")).await;
                return;
            }
        };

        let cancellable = CancellableJob::new();
        let job_timeout = Duration::from_millis(job.timeout_ms);

        let mut current = data;
        for action in pipeline.steps() {
            if cancellable.token().is_cancelled() {
                break;
            }

            let attempt_result =
                timeout(job_timeout, self.run_action_with_retry(action, &current, &run_ctx, job.max_retries as u32)).await;

            let outcome = match attempt_result {
                Ok(outcome) => outcome,
                Err(_elapsed) => {
                    cancellable.cancel(CancellationReason::Timeout);
                    self.retry_or_fail_job(&job, &run_ctx, CancellationReason::Timeout.description()).await;
                    return;
                }
            };

            match outcome {
                Ok(next) => current = next,
                Err((FailureClass::Business, message)) => {
                    // A business-rule failure should have been caught and
                    // annotated by the action itself; if one escapes here
                    // regardless, the pipeline still proceeds unchanged
                    // rather than failing the whole job.
                    warn!(target: "recipe.pipeline", action = %action.name(), message, "business failure reached worker layer unannotated");
                }
                Err((_, message)) => {
                    self.fail_job(&job, &run_ctx, &message).await;
                    return;
                }
            }
        }

        if let Err(err) = self.deps.broker.ack(self.queue, &job.job_id).await {
            warn!(target: "recipe.worker", queue = %self.queue, job_id = %job.job_id, error = %err, "ack failed");
        }
        debug!(target: "recipe.worker", queue = %self.queue, job_id = %job.job_id, "job completed");
    }

    /// Run one action, retrying in-process (same action only) on
    /// transient failure up to the job's `max_retries`.
    async fn run_action_with_retry(
        &self,
        action: &Box<dyn crate::action::Action<D>>,
        data: &D,
        run_ctx: &ActionRunContext,
        max_retries: u32,
    ) -> Result<D, (FailureClass, String)> {
        let mut attempt: u32 = 1;
        loop {
            let outcome = action.execute_with_timing(data.clone(), &self.deps, run_ctx).await;
            if outcome.success {
                return Ok(outcome.data.expect("success outcomes always carry data"));
            }

            let err = outcome.error.expect("failed outcomes always carry an error");
            let occurrence_key = format!(
                "{}:{}",
                run_ctx.note_id.map(|n| n.to_string()).unwrap_or_default(),
                action.name()
            );
            let class = self.deps.error_handler.classify(&err, &occurrence_key);

            info!(
                target: "recipe.pipeline",
                action = %action.name(),
                attempt,
                duration_ms = outcome.duration.as_millis() as u64,
                class = ?class,
                "action failed"
            );

            if class == FailureClass::Transient && attempt < max_retries && action.retryable() {
                let delay = self.backoff.delay_ms(attempt);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
                continue;
            }

            return Err((class, err.to_string()));
        }
    }

    async fn fail_job(&self, job: &recipe_queue::Job, run_ctx: &ActionRunContext, message: &str) {
        if let Some(import_id) = job.import_id {
            self.deps
                .broadcaster
                .add_status_event_and_broadcast(StatusEvent::error(import_id, run_ctx.note_id, message, 2));
        }
        if let Err(err) = self.deps.broker.ack(self.queue, &job.job_id).await {
            warn!(target: "recipe.worker", queue = %self.queue, job_id = %job.job_id, error = %err, "ack after failure also failed");
        }
    }

    /// Nack for redelivery while the job still has attempts left;
    /// otherwise fail it terminally. Used on the hard per-action timeout,
    /// which can cut a job off before `run_action_with_retry`'s own loop
    /// has exhausted its attempts.
    async fn retry_or_fail_job(&self, job: &recipe_queue::Job, run_ctx: &ActionRunContext, message: &str) {
        if (job.attempt_number as u32) < job.max_retries as u32 {
            let delay = self.backoff.delay_ms(job.attempt_number);
            if let Err(err) = self.deps.broker.nack(self.queue, &job.job_id, delay).await {
                warn!(target: "recipe.worker", queue = %self.queue, job_id = %job.job_id, error = %err, "nack after timeout also failed");
            }
            return;
        }
        self.fail_job(job, run_ctx, message).await;
    }
}
