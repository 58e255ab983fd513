//! Lifecycle events
//!
//! Event types, the synchronous fan-out publisher and the built-in
//! subscribers. Notification delivery beyond the local process (chat,
//! issue trackers) belongs to external subscribers.

mod event;
mod publisher;
mod subscribers;

pub use event::{EventKind, RunEvent};
pub use publisher::{EventPublisher, Subscriber};
pub use subscribers::{JsonLinesSubscriber, LogSubscriber};

#[cfg(test)]
pub(crate) use publisher::test_support;
