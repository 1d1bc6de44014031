//! Event stream
//!
//! Single-process publish/subscribe fan-out. Subscriptions are additive and
//! live for the lifetime of the stream; delivery preserves publish order.

mod memory;

pub use memory::InMemoryEventStream;

use async_trait::async_trait;

use crate::eventsourcing::aggregate::Aggregate;
use crate::eventsourcing::event::EventEnvelope;

/// A subscriber callback, invoked serially per event.
pub type SubscribeFn<A> = Box<dyn Fn(&EventEnvelope<A>) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The dispatcher is gone; nothing can be delivered anymore.
    #[error("event stream closed")]
    Closed,
}

/// In-process fan-out of events to subscribers.
///
/// Delivery is at-least-once end to end: the outbox publisher may replay a
/// batch after a crash, so subscribers must tolerate duplicates.
#[async_trait]
pub trait EventStream<A: Aggregate>: Send + Sync {
    /// Deliver events to every current subscriber, preserving input order.
    async fn publish(&self, events: Vec<EventEnvelope<A>>) -> Result<(), StreamError>;

    /// Register a subscriber. There is no unsubscribe; subscriber lifetime
    /// is the stream's lifetime.
    fn subscribe(&self, subscriber: SubscribeFn<A>);
}
