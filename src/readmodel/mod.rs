//! Read models
//!
//! Projections derived from the event stream, optimized for queries. Read
//! models subscribe to the stream and never halt: a bad event is logged and
//! skipped so one poisoned record cannot take the whole view down.

mod generic;
mod memory;

pub use generic::{CreateFn, DeleteFn, GenericProjector, UpdateFn};
pub use memory::{InMemoryReadModel, UpdatedTypes};

use uuid::Uuid;

use crate::eventsourcing::aggregate::Aggregate;

/// Errors raised by read-model handling.
#[derive(Debug, thiserror::Error)]
pub enum ReadModelError {
    #[error("aggregate not found in read model")]
    NotFound,

    #[error("unknown event type: {0}")]
    UnknownEvent(String),

    #[error("failed to apply event: {0}")]
    Apply(String),
}

/// Predicate over projected aggregates.
pub type AggregateMatcher<A> = Box<dyn Fn(&A) -> bool + Send + Sync>;

/// Matcher that requires every given matcher to hold.
pub fn match_all<A: Aggregate>(matchers: Vec<AggregateMatcher<A>>) -> AggregateMatcher<A> {
    Box::new(move |aggregate| matchers.iter().all(|matcher| matcher(aggregate)))
}

/// Matcher that requires at least one given matcher to hold.
pub fn match_any<A: Aggregate>(matchers: Vec<AggregateMatcher<A>>) -> AggregateMatcher<A> {
    Box::new(move |aggregate| matchers.iter().any(|matcher| matcher(aggregate)))
}

/// Matcher on the aggregate id.
pub fn match_aggregate_id<A: Aggregate>(aggregate_id: Uuid) -> AggregateMatcher<A> {
    Box::new(move |aggregate| aggregate.aggregate_id() == aggregate_id)
}
