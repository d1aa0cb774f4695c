// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! In-process priority queue broker, grounded on the same sorted-`Vec`
//! discipline as a classic single-process run queue: small enough to
//! reason about, adequate for tests and single-node dev.

use crate::{Job, QueueBroker, QueueError};
use async_trait::async_trait;
use recipe_core::QueueName;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

#[derive(Debug)]
struct QueuedJob {
    job: Job,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.job.priority == other.job.priority && self.job.created_at == other.job.created_at
    }
}
impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first; ties broken by older jobs first (FIFO).
        self.job
            .priority
            .cmp(&other.job.priority)
            .then_with(|| other.job.created_at.cmp(&self.job.created_at))
    }
}

struct QueueState {
    ready: Vec<QueuedJob>,
    in_flight: HashMap<String, Job>,
}

impl QueueState {
    fn new() -> Self {
        Self { ready: Vec::new(), in_flight: HashMap::new() }
    }

    fn pop_highest_priority(&mut self) -> Option<Job> {
        if self.ready.is_empty() {
            return None;
        }
        let (idx, _) = self.ready.iter().enumerate().max_by(|a, b| a.1.cmp(b.1))?;
        let queued = self.ready.remove(idx);
        Some(queued.job)
    }
}

/// An in-memory broker: one independent priority queue per [`QueueName`].
/// Suitable for tests and single-process deployments, not for durability
/// across restarts.
pub struct InMemoryBroker {
    queues: HashMap<QueueName, Arc<Mutex<QueueState>>>,
}

impl InMemoryBroker {
    /// Build a broker with an empty queue for each of the seven names.
    pub fn new() -> Self {
        let mut queues = HashMap::new();
        for name in QueueName::ALL {
            queues.insert(name, Arc::new(Mutex::new(QueueState::new())));
        }
        Self { queues }
    }

    fn state(&self, queue: QueueName) -> Arc<Mutex<QueueState>> {
        self.queues
            .get(&queue)
            .cloned()
            .expect("every QueueName has a backing state, populated in new()")
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueBroker for InMemoryBroker {
    async fn enqueue(&self, queue: QueueName, job: Job) -> Result<(), QueueError> {
        let state = self.state(queue);
        let mut guard = state.lock().await;
        if guard.in_flight.contains_key(&job.job_id) || guard.ready.iter().any(|q| q.job.job_id == job.job_id) {
            return Err(QueueError::DuplicateId(job.job_id));
        }
        guard.ready.push(QueuedJob { job });
        Ok(())
    }

    async fn dequeue(&self, queue: QueueName) -> Result<Option<Job>, QueueError> {
        let state = self.state(queue);
        let mut guard = state.lock().await;
        let Some(job) = guard.pop_highest_priority() else {
            return Ok(None);
        };
        guard.in_flight.insert(job.job_id.clone(), job.clone());
        Ok(Some(job))
    }

    async fn ack(&self, queue: QueueName, job_id: &str) -> Result<(), QueueError> {
        let state = self.state(queue);
        let mut guard = state.lock().await;
        guard.in_flight.remove(job_id).ok_or_else(|| QueueError::UnknownJob(job_id.to_string()))?;
        Ok(())
    }

    async fn nack(&self, queue: QueueName, job_id: &str, retry_after_ms: u64) -> Result<(), QueueError> {
        let state = self.state(queue);
        let mut job = {
            let mut guard = state.lock().await;
            guard.in_flight.remove(job_id).ok_or_else(|| QueueError::UnknownJob(job_id.to_string()))?
        };
        job.attempt_number += 1;
        let redeliver_state = state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(retry_after_ms)).await;
            let mut guard = redeliver_state.lock().await;
            guard.ready.push(QueuedJob { job });
        });
        Ok(())
    }
}

impl Clone for QueuedJob {
    fn clone(&self) -> Self {
        Self { job: self.job.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipe_core::JobEnvelope;
    use serde_json::json;

    fn job(priority: u8) -> Job {
        let mut j = JobEnvelope::new(json!({}), None, None);
        j.priority = priority;
        j
    }

    #[tokio::test]
    async fn dequeue_returns_highest_priority_first() {
        let broker = InMemoryBroker::new();
        broker.enqueue(QueueName::Note, job(3)).await.unwrap();
        broker.enqueue(QueueName::Note, job(9)).await.unwrap();
        let first = broker.dequeue(QueueName::Note).await.unwrap().unwrap();
        assert_eq!(first.priority, 9);
    }

    #[tokio::test]
    async fn duplicate_job_id_rejected() {
        let broker = InMemoryBroker::new();
        let j = job(5);
        broker.enqueue(QueueName::Note, j.clone()).await.unwrap();
        let err = broker.enqueue(QueueName::Note, j).await.unwrap_err();
        assert!(matches!(err, QueueError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn ack_removes_in_flight_job() {
        let broker = InMemoryBroker::new();
        broker.enqueue(QueueName::Note, job(5)).await.unwrap();
        let j = broker.dequeue(QueueName::Note).await.unwrap().unwrap();
        broker.ack(QueueName::Note, &j.job_id).await.unwrap();
        assert!(broker.ack(QueueName::Note, &j.job_id).await.is_err());
    }

    #[tokio::test]
    async fn empty_queue_dequeues_none() {
        let broker = InMemoryBroker::new();
        assert!(broker.dequeue(QueueName::Image).await.unwrap().is_none());
    }
}
