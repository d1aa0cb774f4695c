// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The dependency container: built bottom-up once at startup, then held
//! read-only by every worker and action for the life of the process.

use crate::broadcaster::StatusBroadcaster;
use crate::tracker::CompletionTracker;
use recipe_persistence::NoteStore;
use recipe_queue::QueueBroker;
use recipe_retry::ErrorHandler;
use std::sync::Arc;

/// Everything an action or worker needs to reach outside its own
/// pipeline. Cheap to clone (an `Arc` bundle); never mutated after
/// construction except through the interior mutability of its members.
#[derive(Clone)]
pub struct AppContext {
    pub broker: Arc<dyn QueueBroker>,
    pub notes: Arc<dyn NoteStore>,
    pub broadcaster: Arc<StatusBroadcaster>,
    pub tracker: Arc<CompletionTracker>,
    pub error_handler: Arc<ErrorHandler>,
}

impl AppContext {
    /// Assemble the container from its already-constructed collaborators.
    /// Construction order matters for the process as a whole (broker ->
    /// persistence -> factory+registry -> workers -> broadcaster -> HTTP
    /// intake) but this struct itself has no internal ordering
    /// dependency — it is a plain bundle of already-built `Arc`s.
    pub fn new(
        broker: Arc<dyn QueueBroker>,
        notes: Arc<dyn NoteStore>,
        broadcaster: Arc<StatusBroadcaster>,
        tracker: Arc<CompletionTracker>,
        error_handler: Arc<ErrorHandler>,
    ) -> Self {
        Self { broker, notes, broadcaster, tracker, error_handler }
    }
}
