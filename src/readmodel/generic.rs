//! Generic read-model projector
//!
//! Hook-based base for building read models over any storage. It folds each
//! received event into the aggregate and delegates persistence to three
//! hooks keyed on the configured created/deleted event types; every other
//! type is an update.
//!
//! The generic approach loads, applies and saves the whole aggregate per
//! event. Storage-specific projectors that update only the touched fields
//! are faster and should replace this one where it matters.

use std::sync::Arc;

use uuid::Uuid;

use crate::eventsourcing::aggregate::Aggregate;
use crate::eventsourcing::event::EventEnvelope;
use crate::stream::EventStream;

use super::ReadModelError;

/// Persist a newly created aggregate.
pub type CreateFn<A> = Box<dyn Fn(A) -> Result<(), ReadModelError> + Send + Sync>;

/// Load the aggregate with the given id, run the transform, persist the
/// result.
pub type UpdateFn<A> =
    Box<dyn Fn(Uuid, &dyn Fn(A) -> Result<A, ReadModelError>) -> Result<(), ReadModelError> + Send + Sync>;

/// Remove the aggregate with the given id.
pub type DeleteFn = Box<dyn Fn(Uuid) -> Result<(), ReadModelError> + Send + Sync>;

/// Read-model base dispatching events to storage hooks.
pub struct GenericProjector<A: Aggregate> {
    created_type: String,
    deleted_type: String,
    on_create: CreateFn<A>,
    on_update: UpdateFn<A>,
    on_delete: DeleteFn,
}

impl<A: Aggregate> GenericProjector<A> {
    pub fn new(
        created_type: impl Into<String>,
        deleted_type: impl Into<String>,
        on_create: CreateFn<A>,
        on_update: UpdateFn<A>,
        on_delete: DeleteFn,
    ) -> Self {
        Self {
            created_type: created_type.into(),
            deleted_type: deleted_type.into(),
            on_create,
            on_update,
            on_delete,
        }
    }

    /// Subscribe this projector to a stream for its whole lifetime.
    pub fn attach(self: &Arc<Self>, stream: &dyn EventStream<A>) {
        let projector = Arc::clone(self);
        stream.subscribe(Box::new(move |event| projector.handle_event(event)));
    }

    /// Project one event. Errors are logged, never propagated: the
    /// projector must not halt.
    pub fn handle_event(&self, event: &EventEnvelope<A>) {
        let result = if event.event_type() == self.created_type {
            self.create(event)
        } else if event.event_type() == self.deleted_type {
            (self.on_delete)(event.aggregate_id())
        } else {
            self.update(event)
        };

        if let Err(err) = result {
            tracing::error!(
                error = %err,
                aggregate_id = %event.aggregate_id(),
                aggregate_type = %event.aggregate_type(),
                event_type = event.event_type(),
                "read model: error handling event"
            );
        }
    }

    fn create(&self, event: &EventEnvelope<A>) -> Result<(), ReadModelError> {
        let mut aggregate = A::default();
        aggregate
            .apply(event)
            .map_err(|err| ReadModelError::Apply(err.to_string()))?;

        (self.on_create)(aggregate)
    }

    fn update(&self, event: &EventEnvelope<A>) -> Result<(), ReadModelError> {
        (self.on_update)(event.aggregate_id(), &|mut aggregate: A| {
            aggregate
                .apply(event)
                .map_err(|err| ReadModelError::Apply(err.to_string()))?;
            Ok(aggregate)
        })
    }
}
