// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Redis-backed [`QueueBroker`], for deployments where jobs must survive
//! a worker restart. Uses a sorted set keyed by priority for the ready
//! queue and a hash for in-flight tracking, the minimum shape needed to
//! honor the four-operation contract — not a reimplementation of a
//! general-purpose broker's wire protocol (explicitly out of scope).

use crate::{Job, QueueBroker, QueueError};
use async_trait::async_trait;
use recipe_core::QueueName;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// A queue broker backed by Redis lists/hashes via a multiplexed,
/// auto-reconnecting connection.
pub struct RedisBroker {
    conn: ConnectionManager,
}

impl RedisBroker {
    /// Connect to `redis://host:port` (optionally with a password
    /// embedded in the URL) and build a broker over it.
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Ok(Self { conn })
    }

    fn ready_key(queue: QueueName) -> String {
        format!("recipe:queue:{queue}:ready")
    }

    fn inflight_key(queue: QueueName) -> String {
        format!("recipe:queue:{queue}:inflight")
    }
}

#[async_trait]
impl QueueBroker for RedisBroker {
    async fn enqueue(&self, queue: QueueName, job: Job) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&job).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let already: bool = conn
            .hexists(Self::inflight_key(queue), &job.job_id)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        if already {
            return Err(QueueError::DuplicateId(job.job_id));
        }
        let score = f64::from(job.priority);
        let _: () = conn
            .zadd(Self::ready_key(queue), payload, -score)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn dequeue(&self, queue: QueueName) -> Result<Option<Job>, QueueError> {
        let mut conn = self.conn.clone();
        let popped: Vec<String> = conn
            .zpopmin(Self::ready_key(queue), 1)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let Some(payload) = popped.into_iter().next() else {
            return Ok(None);
        };
        let job: Job = serde_json::from_str(&payload).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let _: () = conn
            .hset(Self::inflight_key(queue), &job.job_id, &payload)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Ok(Some(job))
    }

    async fn ack(&self, queue: QueueName, job_id: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .hdel(Self::inflight_key(queue), job_id)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        if removed == 0 {
            return Err(QueueError::UnknownJob(job_id.to_string()));
        }
        Ok(())
    }

    async fn nack(&self, queue: QueueName, job_id: &str, retry_after_ms: u64) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .hget(Self::inflight_key(queue), job_id)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let Some(payload) = payload else {
            return Err(QueueError::UnknownJob(job_id.to_string()));
        };
        let mut job: Job = serde_json::from_str(&payload).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        job.attempt_number += 1;
        let _: () = conn
            .hdel(Self::inflight_key(queue), job_id)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        let requeue_payload = serde_json::to_string(&job).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let ready_key = Self::ready_key(queue);
        let mut delayed_conn = self.conn.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(retry_after_ms)).await;
            let score = f64::from(job.priority);
            let _: redis::RedisResult<()> = delayed_conn.zadd(ready_key, requeue_payload, -score).await;
        });
        Ok(())
    }
}
