//! Event store
//!
//! Typed facade over the untyped event repository: encodes events on the way
//! in, decodes records on the way out. When constructed with the outbox
//! enabled, every append also stages the events for asynchronous fan-out.

use std::sync::Arc;

use uuid::Uuid;

use super::aggregate::{Aggregate, AggregateType};
use super::error::StoreError;
use super::event::{from_records, to_record, EventEnvelope};
use super::query::EventQuery;
use super::registry::EventRegistry;
use super::user::UserFactory;
use crate::repository::{EventRepository, PUBLISHED, UNPUBLISHED};

/// Typed event store for one aggregate family.
pub struct EventStore<A: Aggregate> {
    repo: Arc<dyn EventRepository>,
    registry: Arc<EventRegistry<A>>,
    users: UserFactory,
    with_outbox: bool,
}

impl<A: Aggregate> Clone for EventStore<A> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            registry: Arc::clone(&self.registry),
            users: Arc::clone(&self.users),
            with_outbox: self.with_outbox,
        }
    }
}

impl<A: Aggregate> EventStore<A> {
    /// `with_outbox` is the CQRS switch: when false the engine degrades to
    /// pure event sourcing with no asynchronous fan-out.
    pub fn new(
        repo: Arc<dyn EventRepository>,
        registry: Arc<EventRegistry<A>>,
        users: UserFactory,
        with_outbox: bool,
    ) -> Self {
        Self {
            repo,
            registry,
            users,
            with_outbox,
        }
    }

    /// Append events atomically, staging outbox rows when enabled.
    pub async fn store(&self, events: &[EventEnvelope<A>]) -> Result<(), StoreError> {
        let mut records = Vec::with_capacity(events.len());
        for event in events {
            records.push(to_record(event, &self.registry)?);
        }

        self.repo.save(self.with_outbox, records).await?;

        for event in events {
            tracing::debug!(event = %event, "stored event");
        }

        Ok(())
    }

    /// Load the full history of one aggregate, ascending by version.
    pub async fn load(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: Uuid,
    ) -> Result<Vec<EventEnvelope<A>>, StoreError> {
        let query = EventQuery::new()
            .with_aggregate_type(aggregate_type.clone())
            .with_aggregate_id(aggregate_id);

        let records = self.repo.get(&query).await?;

        Ok(from_records(&records, &self.registry, &self.users)?)
    }

    /// Load a batch of not-yet-published events from the outbox.
    pub async fn load_unpublished(
        &self,
        batch_size: usize,
    ) -> Result<Vec<EventEnvelope<A>>, StoreError> {
        let records = self.repo.get_unpublished(batch_size).await?;

        Ok(from_records(&records, &self.registry, &self.users)?)
    }

    /// Flag events as delivered to the stream.
    pub async fn mark_published(&self, events: &[EventEnvelope<A>]) -> Result<(), StoreError> {
        let ids = event_ids(events);
        Ok(self.repo.mark_as(PUBLISHED, &ids).await?)
    }

    /// Put events back into the outbox so they are delivered again.
    pub async fn republish(&self, events: &[EventEnvelope<A>]) -> Result<(), StoreError> {
        let ids = event_ids(events);
        Ok(self.repo.mark_as(UNPUBLISHED, &ids).await?)
    }

    pub fn registry(&self) -> &EventRegistry<A> {
        &self.registry
    }
}

fn event_ids<A: Aggregate>(events: &[EventEnvelope<A>]) -> Vec<Uuid> {
    events.iter().map(|event| event.event_id()).collect()
}
