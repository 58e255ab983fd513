//! Event fan-out over subscribers
//!
//! [`EventPublisher`] hands each [`RunEvent`] to every interested subscriber in
//! registration order. Delivery is synchronous, but a subscriber error or
//! panic is caught and logged: it never reaches the caller.
//!
//! ```text
//!    publish(&RunEvent)
//!        ├──► S1.accepts? ──► S1.on_event()   (error/panic → log)
//!        ├──► S2.accepts? ──► S2.on_event()
//!        └──► SN.accepts? ──► SN.on_event()
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, warn};

use super::{EventKind, RunEvent};
use crate::utils::panic_message;

/// Receiver of lifecycle events.
///
/// Implementations should return quickly; they run inside the result
/// aggregator's critical section.
pub trait Subscriber: Send + Sync {
    /// Handle one event. Errors are logged by the publisher and dropped.
    fn on_event(&self, event: &RunEvent) -> anyhow::Result<()>;

    /// Name used in log lines
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Subscription filter; defaults to every kind
    fn accepts(&self, _kind: EventKind) -> bool {
        true
    }
}

/// Fixed set of subscribers built at startup
#[derive(Default)]
pub struct EventPublisher {
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl EventPublisher {
    pub fn new(subscribers: Vec<Arc<dyn Subscriber>>) -> Self {
        Self { subscribers }
    }

    /// Deliver to every accepting subscriber; never fails
    pub fn publish(&self, event: &RunEvent) {
        for subscriber in &self.subscribers {
            if !subscriber.accepts(event.kind) {
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        "Subscriber '{}' failed on {}: {:#}",
                        subscriber.name(),
                        event.kind,
                        e
                    );
                }
                Err(payload) => {
                    error!(
                        "Subscriber '{}' panicked on {}: {}",
                        subscriber.name(),
                        event.kind,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
