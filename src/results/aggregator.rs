//! Result aggregation
//!
//! Collects every [`RunResult`] of a run. Recording a result and publishing
//! its lifecycle event happen under one lock, so the order of the collection
//! is exactly the order subscribers observe.
//!
//! [`ResultAggregator::close`] seals the collection when the run ends. A unit
//! whose engine call was still in flight at an interrupt finishes later; its
//! result is logged and dropped so nothing is published after RUN_SUMMARY.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::events::{EventPublisher, RunEvent};
use crate::models::RunResult;

#[derive(Default)]
struct Collected {
    results: Vec<RunResult>,
    closed: bool,
}

/// Thread-safe result sink shared by all unit tasks
pub struct ResultAggregator {
    session_id: String,
    publisher: Arc<EventPublisher>,
    state: Mutex<Collected>,
}

impl ResultAggregator {
    pub fn new(session_id: impl Into<String>, publisher: Arc<EventPublisher>) -> Self {
        Self {
            session_id: session_id.into(),
            publisher,
            state: Mutex::new(Collected::default()),
        }
    }

    /// Append a result and publish its event as one atomic step
    pub fn record(&self, result: RunResult) {
        let mut state = self.lock();
        if state.closed {
            warn!(
                "Dropping {} result for {}: run {} already finished",
                result.status, result.resolved_target, self.session_id
            );
            return;
        }
        let event = RunEvent::test(self.session_id.as_str(), result.clone());
        state.results.push(result);
        self.publisher.publish(&event);
    }

    /// Seal the collection and return its final contents
    pub fn close(&self) -> Vec<RunResult> {
        let mut state = self.lock();
        state.closed = true;
        state.results.clone()
    }

    /// Snapshot of all results in recording order
    #[cfg(test)]
    pub fn results(&self) -> Vec<RunResult> {
        self.lock().results.clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().results.len()
    }

    // Subscriber panics are caught inside publish; a poisoned collection is still whole.
    fn lock(&self) -> MutexGuard<'_, Collected> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
