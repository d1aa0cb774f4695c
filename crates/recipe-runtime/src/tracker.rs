// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The in-process, per-note fan-out completion counter.

use recipe_core::CompletionSnapshot;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

struct TrackerEntry {
    total_jobs: u64,
    completed_jobs: i64,
    is_complete: bool,
}

impl TrackerEntry {
    fn snapshot(&self) -> CompletionSnapshot {
        CompletionSnapshot {
            total_jobs: self.total_jobs,
            completed_jobs: self.completed_jobs,
            is_complete: self.is_complete,
        }
    }
}

/// Process-wide per-note completion tracker. A single mutex around the
/// map is the whole synchronization story — per-key locking would be a
/// valid optimization, but this workspace doesn't need it at this scale.
#[derive(Default)]
pub struct CompletionTracker {
    entries: Mutex<HashMap<Uuid, TrackerEntry>>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite any prior tracker for `note_id`, resetting
    /// `completed_jobs = 0, is_complete = false`.
    pub fn create(&self, note_id: Uuid, total_jobs: u64) {
        let mut guard = self.entries.lock().expect("lock poisoned");
        guard.insert(note_id, TrackerEntry { total_jobs, completed_jobs: 0, is_complete: total_jobs == 0 });
    }

    /// Set the absolute completed count. If no tracker exists, synthesize
    /// one with `total_jobs = completed_jobs, is_complete = true` — the
    /// asymmetry with [`Self::check`]'s absence handling is deliberate.
    pub fn update(&self, note_id: Uuid, completed_jobs: i64) {
        let mut guard = self.entries.lock().expect("lock poisoned");
        match guard.get_mut(&note_id) {
            Some(entry) => {
                entry.completed_jobs = completed_jobs;
                entry.is_complete = completed_jobs >= entry.total_jobs as i64;
            }
            None => {
                guard.insert(
                    note_id,
                    TrackerEntry {
                        total_jobs: completed_jobs.max(0) as u64,
                        completed_jobs,
                        is_complete: true,
                    },
                );
            }
        }
    }

    /// Add one to the completed count, unless already complete (silent
    /// no-op — this is what makes duplicate completion messages under
    /// at-least-once delivery safe). If absent, synthesize `{1, 1, true}`.
    pub fn increment(&self, note_id: Uuid) -> CompletionSnapshot {
        let mut guard = self.entries.lock().expect("lock poisoned");
        let entry = guard.entry(note_id).or_insert(TrackerEntry { total_jobs: 1, completed_jobs: 0, is_complete: false });
        if !entry.is_complete {
            entry.completed_jobs += 1;
            entry.is_complete = entry.completed_jobs >= entry.total_jobs as i64;
        }
        entry.snapshot()
    }

    /// Read the current state. Absence is interpreted as "nothing left
    /// to wait for": `{is_complete: true, completed_jobs: 0, total_jobs: 0}`.
    pub fn check(&self, note_id: Uuid) -> CompletionSnapshot {
        let guard = self.entries.lock().expect("lock poisoned");
        match guard.get(&note_id) {
            Some(entry) => entry.snapshot(),
            None => CompletionSnapshot { total_jobs: 0, completed_jobs: 0, is_complete: true },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_increment_to_completion() {
        let tracker = CompletionTracker::new();
        let note_id = Uuid::new_v4();
        tracker.create(note_id, 3);
        assert!(!tracker.check(note_id).is_complete);
        tracker.increment(note_id);
        tracker.increment(note_id);
        let snap = tracker.increment(note_id);
        assert!(snap.is_complete);
        assert_eq!(snap.completed_jobs, 3);
    }

    #[test]
    fn increment_after_completion_is_silent() {
        let tracker = CompletionTracker::new();
        let note_id = Uuid::new_v4();
        tracker.create(note_id, 1);
        let first = tracker.increment(note_id);
        assert!(first.is_complete);
        let second = tracker.increment(note_id);
        assert_eq!(second.completed_jobs, 1);
    }

    #[test]
    fn zero_total_jobs_completes_immediately() {
        let tracker = CompletionTracker::new();
        let note_id = Uuid::new_v4();
        tracker.create(note_id, 0);
        assert!(tracker.check(note_id).is_complete);
    }

    #[test]
    fn check_on_absent_tracker_reports_complete() {
        let tracker = CompletionTracker::new();
        let snap = tracker.check(Uuid::new_v4());
        assert_eq!(snap, CompletionSnapshot { total_jobs: 0, completed_jobs: 0, is_complete: true });
    }

    #[test]
    fn update_on_absent_tracker_synthesizes_complete() {
        let tracker = CompletionTracker::new();
        let note_id = Uuid::new_v4();
        tracker.update(note_id, 5);
        let snap = tracker.check(note_id);
        assert_eq!(snap, CompletionSnapshot { total_jobs: 5, completed_jobs: 5, is_complete: true });
    }

    #[test]
    fn update_accepts_negative_completed_jobs_without_clamping() {
        let tracker = CompletionTracker::new();
        let note_id = Uuid::new_v4();
        tracker.create(note_id, 2);
        tracker.update(note_id, -1);
        let snap = tracker.check(note_id);
        assert_eq!(snap.completed_jobs, -1);
        assert!(!snap.is_complete);
    }
}
