//! Admin use-cases
//!
//! Operator-facing operations over the event log: list stored events, load
//! an aggregate at an arbitrary version, and reset the outbox so an
//! aggregate's events are delivered again.

use std::sync::Arc;

use uuid::Uuid;

use crate::eventsourcing::aggregate::Aggregate;
use crate::eventsourcing::error::{HandlerError, StoreError};
use crate::eventsourcing::event::from_records;
use crate::eventsourcing::handler::CommandHandler;
use crate::eventsourcing::query::EventQuery;
use crate::eventsourcing::registry::EventRegistry;
use crate::eventsourcing::user::UserFactory;
use crate::repository::{EventRecord, EventRepository, RepositoryError, UNPUBLISHED};

/// Sentinel meaning "replay the full history". The first real event is at
/// version 1, so 0 can never be a partial load.
pub const ALL_VERSIONS: i64 = 0;

/// Pass-through listing of stored event records.
pub struct ListEvents {
    repo: Arc<dyn EventRepository>,
}

impl ListEvents {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }

    pub async fn handle(&self, query: &EventQuery) -> Result<Vec<EventRecord>, RepositoryError> {
        self.repo.get(query).await
    }
}

/// Rebuild an aggregate, optionally stopping at a version.
pub struct LoadAggregate<A: Aggregate> {
    handler: Arc<CommandHandler<A>>,
    repo: Arc<dyn EventRepository>,
    registry: Arc<EventRegistry<A>>,
    users: UserFactory,
}

impl<A: Aggregate> LoadAggregate<A> {
    pub fn new(
        handler: Arc<CommandHandler<A>>,
        repo: Arc<dyn EventRepository>,
        registry: Arc<EventRegistry<A>>,
        users: UserFactory,
    ) -> Self {
        Self {
            handler,
            repo,
            registry,
            users,
        }
    }

    pub async fn handle(&self, aggregate_id: Uuid, to_version: i64) -> Result<A, HandlerError> {
        if to_version == ALL_VERSIONS {
            return self
                .handler
                .hydrate_aggregate(&A::aggregate_type(), aggregate_id)
                .await;
        }

        let query = EventQuery::new()
            .with_aggregate_id(aggregate_id)
            .with_aggregate_type(A::aggregate_type())
            .with_up_to_version(to_version);

        let records = self.repo.get(&query).await.map_err(StoreError::from)?;
        let events = from_records(&records, &self.registry, &self.users).map_err(StoreError::from)?;

        if events.is_empty() {
            return Err(HandlerError::AggregateNotFound(aggregate_id));
        }

        self.handler
            .hydrate_aggregate_from_events(&A::aggregate_type(), &events)
    }
}

/// Reset the outbox flag for every event of one aggregate.
pub struct RepublishAggregate {
    repo: Arc<dyn EventRepository>,
}

impl RepublishAggregate {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }

    /// Returns the number of records put back into the outbox. Idempotent
    /// on records that are already unpublished.
    pub async fn handle(&self, aggregate_id: Uuid) -> Result<usize, RepositoryError> {
        let records = self
            .repo
            .get(&EventQuery::new().with_aggregate_id(aggregate_id))
            .await?;

        let event_ids: Vec<Uuid> = records.iter().map(|record| record.event_id).collect();
        self.repo.mark_as(UNPUBLISHED, &event_ids).await?;

        tracing::info!(
            aggregate_id = %aggregate_id,
            count = event_ids.len(),
            "republished aggregate events"
        );

        Ok(event_ids.len())
    }
}
