//! Admin surface
//!
//! Thin operator-facing layer over the kernel: the use-cases plus an HTTP
//! adapter exposing them.

pub mod http;
pub mod usecase;

pub use http::admin_router;
pub use usecase::{ListEvents, LoadAggregate, RepublishAggregate, ALL_VERSIONS};

use std::sync::Arc;

use uuid::Uuid;

use crate::eventsourcing::aggregate::Aggregate;
use crate::eventsourcing::error::HandlerError;
use crate::eventsourcing::handler::CommandHandler;
use crate::eventsourcing::query::EventQuery;
use crate::eventsourcing::registry::EventRegistry;
use crate::eventsourcing::user::UserFactory;
use crate::repository::{EventRecord, EventRepository, RepositoryError};

/// Bundle of the admin use-cases for one aggregate family.
pub struct AdminApp<A: Aggregate> {
    list_events: ListEvents,
    load_aggregate: LoadAggregate<A>,
    republish_aggregate: Option<RepublishAggregate>,
}

impl<A: Aggregate> AdminApp<A> {
    /// `cqrs` mirrors the store's outbox switch: with it off there is no
    /// outbox to reset, so republish becomes a no-op.
    pub fn new(
        repo: Arc<dyn EventRepository>,
        registry: Arc<EventRegistry<A>>,
        users: UserFactory,
        handler: Arc<CommandHandler<A>>,
        cqrs: bool,
    ) -> Self {
        Self {
            list_events: ListEvents::new(Arc::clone(&repo)),
            load_aggregate: LoadAggregate::new(handler, Arc::clone(&repo), registry, users),
            republish_aggregate: cqrs.then(|| RepublishAggregate::new(repo)),
        }
    }

    pub async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventRecord>, RepositoryError> {
        self.list_events.handle(query).await
    }

    pub async fn load_aggregate(
        &self,
        aggregate_id: Uuid,
        to_version: i64,
    ) -> Result<A, HandlerError> {
        self.load_aggregate.handle(aggregate_id, to_version).await
    }

    pub async fn republish_aggregate(&self, aggregate_id: Uuid) -> Result<usize, RepositoryError> {
        match &self.republish_aggregate {
            Some(republish) => republish.handle(aggregate_id).await,
            None => {
                tracing::warn!("republish requested but CQRS is disabled");
                Ok(0)
            }
        }
    }
}
