// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Cooperative cancellation for per-job timeouts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Why a job was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// The job's `timeout` elapsed.
    Timeout,
    /// The process is shutting down.
    Shutdown,
}

impl CancellationReason {
    pub fn description(self) -> &'static str {
        match self {
            Self::Timeout => "job exceeded its configured timeout",
            Self::Shutdown => "worker is shutting down",
        }
    }
}

struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cheaply-cloneable cancellation signal. Long-running actions should
/// check [`CancellationToken::is_cancelled`] between suspension points
/// and bail out promptly when set.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self { inner: Arc::new(TokenInner { cancelled: AtomicBool::new(false), notify: Notify::new() }) }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once `cancel()` has been called.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.inner.notify.notified().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A token paired with the first reason it was cancelled for — later
/// cancellations don't overwrite the original reason.
#[derive(Clone)]
pub struct CancellableJob {
    token: CancellationToken,
    reason: Arc<Mutex<Option<CancellationReason>>>,
}

impl CancellableJob {
    pub fn new() -> Self {
        Self { token: CancellationToken::new(), reason: Arc::new(Mutex::new(None)) }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self, reason: CancellationReason) {
        let mut guard = self.reason.lock().expect("lock poisoned");
        if guard.is_none() {
            *guard = Some(reason);
            self.token.cancel();
        }
    }

    pub fn reason(&self) -> Option<CancellationReason> {
        *self.reason.lock().expect("lock poisoned")
    }
}

impl Default for CancellableJob {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellation_resolves_waiters() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        token.cancel();
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn first_reason_wins() {
        let job = CancellableJob::new();
        job.cancel(CancellationReason::Timeout);
        job.cancel(CancellationReason::Shutdown);
        assert_eq!(job.reason(), Some(CancellationReason::Timeout));
    }
}
