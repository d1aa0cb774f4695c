// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![cfg(test)]

//! Shared `AppContext` wiring for this crate's action unit tests.

use recipe_persistence::InMemoryNoteStore;
use recipe_queue::InMemoryBroker;
use recipe_retry::ErrorHandler;
use recipe_runtime::{AppContext, CompletionTracker, StatusBroadcaster};
use std::sync::Arc;

pub fn test_context() -> AppContext {
    AppContext::new(
        Arc::new(InMemoryBroker::new()),
        Arc::new(InMemoryNoteStore::new()),
        Arc::new(StatusBroadcaster::new()),
        Arc::new(CompletionTracker::new()),
        Arc::new(ErrorHandler::new()),
    )
}
