//! In-memory read model
//!
//! Reference projection keeping a guarded list of aggregates. Reads are
//! concurrent, writes exclusive; values are cloned out so callers never
//! hold a reference into the guarded list.

use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::eventsourcing::aggregate::Aggregate;
use crate::eventsourcing::event::EventEnvelope;
use crate::stream::EventStream;

use super::{AggregateMatcher, ReadModelError};

/// Which event types count as updates.
#[derive(Debug, Clone)]
pub enum UpdatedTypes {
    /// Everything that is neither the created nor the deleted type.
    AnyOther,
    /// Only the listed types; anything else is logged as unknown.
    Only(Vec<String>),
}

/// In-memory projection of one aggregate family.
pub struct InMemoryReadModel<A: Aggregate> {
    aggregates: RwLock<Vec<A>>,
    created_type: String,
    deleted_type: String,
    updated_types: UpdatedTypes,
}

impl<A: Aggregate> InMemoryReadModel<A> {
    pub fn new(
        created_type: impl Into<String>,
        deleted_type: impl Into<String>,
        updated_types: UpdatedTypes,
    ) -> Self {
        Self {
            aggregates: RwLock::new(Vec::new()),
            created_type: created_type.into(),
            deleted_type: deleted_type.into(),
            updated_types,
        }
    }

    /// Subscribe this read model to a stream for its whole lifetime.
    pub fn attach(self: &Arc<Self>, stream: &dyn EventStream<A>) {
        let read_model = Arc::clone(self);
        stream.subscribe(Box::new(move |event| read_model.handle_event(event)));
    }

    /// Project one event. Errors are logged, never propagated.
    pub fn handle_event(&self, event: &EventEnvelope<A>) {
        let result = if event.event_type() == self.created_type {
            self.create(event)
        } else if event.event_type() == self.deleted_type {
            self.delete(event.aggregate_id())
        } else if self.is_updated_event(event.event_type()) {
            self.update(event)
        } else {
            Err(ReadModelError::UnknownEvent(event.event_type().to_string()))
        };

        match result {
            Ok(()) => tracing::debug!(
                event_id = %event.event_id(),
                event_type = event.event_type(),
                "read model event applied"
            ),
            Err(err) => tracing::error!(
                error = %err,
                aggregate_id = %event.aggregate_id(),
                event_type = event.event_type(),
                "read model: error handling event"
            ),
        }
    }

    /// All aggregates matching the given matcher; `None` returns everything.
    pub fn find(&self, matcher: Option<&AggregateMatcher<A>>) -> Vec<A> {
        let aggregates = self.aggregates.read();

        match matcher {
            None => aggregates.clone(),
            Some(matcher) => aggregates
                .iter()
                .filter(|aggregate| matcher(aggregate))
                .cloned()
                .collect(),
        }
    }

    /// First aggregate matching the given matcher.
    pub fn get(&self, matcher: &AggregateMatcher<A>) -> Result<A, ReadModelError> {
        self.aggregates
            .read()
            .iter()
            .find(|aggregate| matcher(aggregate))
            .cloned()
            .ok_or(ReadModelError::NotFound)
    }

    fn is_updated_event(&self, event_type: &str) -> bool {
        match &self.updated_types {
            UpdatedTypes::AnyOther => true,
            UpdatedTypes::Only(types) => types.iter().any(|t| t == event_type),
        }
    }

    fn create(&self, event: &EventEnvelope<A>) -> Result<(), ReadModelError> {
        let mut aggregate = A::default();
        aggregate
            .apply(event)
            .map_err(|err| ReadModelError::Apply(err.to_string()))?;

        self.aggregates.write().push(aggregate);
        Ok(())
    }

    fn update(&self, event: &EventEnvelope<A>) -> Result<(), ReadModelError> {
        let mut aggregates = self.aggregates.write();

        let position = aggregates
            .iter()
            .position(|aggregate| aggregate.aggregate_id() == event.aggregate_id())
            .ok_or(ReadModelError::NotFound)?;

        let mut updated = aggregates[position].clone();
        updated
            .apply(event)
            .map_err(|err| ReadModelError::Apply(err.to_string()))?;
        aggregates[position] = updated;

        Ok(())
    }

    fn delete(&self, aggregate_id: Uuid) -> Result<(), ReadModelError> {
        let mut aggregates = self.aggregates.write();

        let position = aggregates
            .iter()
            .position(|aggregate| aggregate.aggregate_id() == aggregate_id)
            .ok_or(ReadModelError::NotFound)?;

        aggregates.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{Contact, ContactEvent, CONTACT_CREATED, CONTACT_DELETED, CONTACT_NAME_SET};
    use crate::eventsourcing::user::system_user;
    use crate::readmodel::{match_aggregate_id, match_all};

    fn read_model() -> InMemoryReadModel<Contact> {
        InMemoryReadModel::new(CONTACT_CREATED, CONTACT_DELETED, UpdatedTypes::AnyOther)
    }

    fn created(id: Uuid) -> EventEnvelope<Contact> {
        EventEnvelope::new(
            ContactEvent::Created {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            },
            id,
            1,
            system_user(),
        )
    }

    fn renamed(id: Uuid, version: i64, last_name: &str) -> EventEnvelope<Contact> {
        EventEnvelope::new(
            ContactEvent::NameSet {
                first_name: "Ada".to_string(),
                last_name: last_name.to_string(),
            },
            id,
            version,
            system_user(),
        )
    }

    #[test]
    fn test_create_update_delete() {
        let read_model = read_model();
        let id = Uuid::new_v4();

        read_model.handle_event(&created(id));
        assert_eq!(read_model.find(None).len(), 1);

        read_model.handle_event(&renamed(id, 2, "King"));
        let contact = read_model.get(&match_aggregate_id(id)).unwrap();
        assert_eq!(contact.last_name(), "King");
        assert_eq!(contact.aggregate_version(), 2);

        read_model.handle_event(&EventEnvelope::new(
            ContactEvent::Deleted,
            id,
            3,
            system_user(),
        ));
        assert!(read_model.find(None).is_empty());
    }

    #[test]
    fn test_update_for_unknown_aggregate_is_logged_not_fatal() {
        let read_model = read_model();

        // No created event was seen; the update is dropped and the model
        // keeps working.
        read_model.handle_event(&renamed(Uuid::new_v4(), 2, "King"));
        assert!(read_model.find(None).is_empty());

        let id = Uuid::new_v4();
        read_model.handle_event(&created(id));
        assert_eq!(read_model.find(None).len(), 1);
    }

    #[test]
    fn test_explicit_updated_types_reject_strays() {
        let read_model = InMemoryReadModel::<Contact>::new(
            CONTACT_CREATED,
            CONTACT_DELETED,
            UpdatedTypes::Only(vec![CONTACT_NAME_SET.to_string()]),
        );
        let id = Uuid::new_v4();

        read_model.handle_event(&created(id));
        read_model.handle_event(&EventEnvelope::new(
            ContactEvent::EmailSet {
                email: "ada@king.example".to_string(),
            },
            id,
            2,
            system_user(),
        ));

        // The stray type is ignored; the contact still has its old email.
        let contact = read_model.get(&match_aggregate_id(id)).unwrap();
        assert_eq!(contact.email(), "ada@example.com");
    }

    #[test]
    fn test_matcher_combinators() {
        let read_model = read_model();
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();

        read_model.handle_event(&created(id_a));
        read_model.handle_event(&created(id_b));
        read_model.handle_event(&renamed(id_b, 2, "King"));

        let king_matcher: Box<dyn Fn(&Contact) -> bool + Send + Sync> =
            Box::new(|c: &Contact| c.last_name() == "King");
        let kings = read_model.find(Some(&king_matcher));
        assert_eq!(kings.len(), 1);

        let both = read_model.find(Some(&crate::readmodel::match_any(vec![
            match_aggregate_id(id_a),
            match_aggregate_id(id_b),
        ])));
        assert_eq!(both.len(), 2);

        let none = read_model.find(Some(&match_all(vec![
            match_aggregate_id(id_a),
            Box::new(|c: &Contact| c.last_name() == "King"),
        ])));
        assert!(none.is_empty());
    }
}
