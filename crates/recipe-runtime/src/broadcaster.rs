// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Constructs, orders, and emits progress events.

use recipe_core::StatusEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// Default channel capacity: generous enough that a momentarily slow
/// subscriber doesn't immediately lag, matching the spirit of a
/// broadcast event bus sized for bursty progress streams.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Default)]
struct BroadcasterStats {
    published: AtomicU64,
    dropped_no_subscribers: AtomicU64,
    broadcast_failures: AtomicU64,
}

/// Appends [`StatusEvent`]s to a per-note ordered log and publishes them
/// to subscribers. Ordering guarantee: events sharing a `note_id` are
/// delivered to any one subscriber in append order; events for different
/// notes may interleave arbitrarily.
pub struct StatusBroadcaster {
    sender: broadcast::Sender<StatusEvent>,
    log: Mutex<HashMap<Uuid, Vec<StatusEvent>>>,
    stats: BroadcasterStats,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        let (sender, _rx) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { sender, log: Mutex::new(HashMap::new()), stats: BroadcasterStats::default() }
    }

    /// Subscribe to the live event stream. A subscriber that joins late
    /// does not see events appended before it subscribed — use
    /// [`Self::replay`] for that.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    /// The ordered log of every event appended for `note_id` so far.
    pub fn replay(&self, note_id: Uuid) -> Vec<StatusEvent> {
        self.log.lock().expect("lock poisoned").get(&note_id).cloned().unwrap_or_default()
    }

    /// Append `event` to its note's ordered log, then publish to
    /// subscribers. The append always succeeds; a broadcast failure (no
    /// subscribers, or a lagged channel) is logged, not propagated — the
    /// caller's promise resolves once append succeeds.
    pub fn add_status_event_and_broadcast(&self, event: StatusEvent) {
        if let Some(note_id) = event.note_id {
            let mut log = self.log.lock().expect("lock poisoned");
            log.entry(note_id).or_default().push(event.clone());
        }

        match self.sender.send(event) {
            Ok(_subscriber_count) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(_no_subscribers) => {
                self.stats.dropped_no_subscribers.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record that a secondary best-effort delivery attempt also failed.
    /// Callers reach this only after `add_status_event_and_broadcast`
    /// already appended the event — the failure here never reopens that
    /// promise, it's accounted for observability only.
    pub fn record_broadcast_failure(&self, reason: &str) {
        self.stats.broadcast_failures.fetch_add(1, Ordering::Relaxed);
        warn!(target: "recipe.broadcaster", reason, "status broadcast failed, event remains in the append log");
    }

    pub fn published_count(&self) -> u64 {
        self.stats.published.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.stats.dropped_no_subscribers.load(Ordering::Relaxed)
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_for_same_note_are_delivered_in_append_order() {
        let broadcaster = StatusBroadcaster::new();
        let note_id = Uuid::new_v4();
        let import_id = Uuid::new_v4();
        let mut rx = broadcaster.subscribe();

        broadcaster.add_status_event_and_broadcast(StatusEvent::progress(
            import_id,
            Some(note_id),
            "ingredient_processing",
            "ingredients",
            0,
            2,
        ));
        broadcaster.add_status_event_and_broadcast(StatusEvent::progress(
            import_id,
            Some(note_id),
            "ingredient_processing",
            "ingredients",
            1,
            2,
        ));
        broadcaster.add_status_event_and_broadcast(StatusEvent::progress(
            import_id,
            Some(note_id),
            "ingredient_processing",
            "ingredients",
            2,
            2,
        ));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        assert_eq!(first.current_count, Some(0));
        assert_eq!(second.current_count, Some(1));
        assert_eq!(third.current_count, Some(2));

        let replayed = broadcaster.replay(note_id);
        assert_eq!(replayed.len(), 3);
    }

    #[test]
    fn publish_with_no_subscribers_is_not_an_error() {
        let broadcaster = StatusBroadcaster::new();
        let note_id = Uuid::new_v4();
        broadcaster.add_status_event_and_broadcast(StatusEvent::completion(Uuid::new_v4(), Some(note_id), "done"));
        assert_eq!(broadcaster.dropped_count(), 1);
        assert_eq!(broadcaster.replay(note_id).len(), 1);
    }
}
