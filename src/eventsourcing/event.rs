//! Events
//!
//! An event is an immutable record of something that happened to an
//! aggregate. In memory it travels as a typed [`EventEnvelope`]: a header
//! with identity and aggregate coordinates plus the domain payload. On disk
//! it becomes an [`EventRecord`] with the payload encoded as JSON.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::aggregate::{Aggregate, AggregateType};
use super::error::RegistryError;
use super::registry::EventRegistry;
use super::user::{User, UserFactory};
use crate::repository::EventRecord;

/// Typed event payload supplied by the domain.
///
/// Payloads are plain serde types; `event_type` returns the registered type
/// string under which the payload is persisted and decoded.
pub trait EventPayload:
    fmt::Debug + Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    fn event_type(&self) -> &'static str;
}

/// Header shared by every event: identity, issuer and aggregate coordinates.
#[derive(Debug, Clone)]
pub struct EventBase {
    event_id: Uuid,
    event_type: String,
    issued_at: DateTime<Utc>,
    issued_by: Arc<dyn User>,
    aggregate_type: AggregateType,
    aggregate_id: Uuid,
    aggregate_version: i64,
}

impl EventBase {
    /// Header for a freshly issued event: new id, stamped now.
    pub fn new(
        aggregate_type: AggregateType,
        aggregate_version: i64,
        event_type: impl Into<String>,
        aggregate_id: Uuid,
        issued_by: Arc<dyn User>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            issued_at: Utc::now(),
            issued_by,
            aggregate_type,
            aggregate_id,
            aggregate_version,
        }
    }

    /// Header rebuilt from a stored record, preserving id and timestamp.
    pub fn from_record(record: &EventRecord, issued_by: Arc<dyn User>) -> Self {
        Self {
            event_id: record.event_id,
            event_type: record.event_type.clone(),
            issued_at: record.event_issued_at,
            issued_by,
            aggregate_type: record.aggregate_type.clone(),
            aggregate_id: record.aggregate_id,
            aggregate_version: record.aggregate_version,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn issued_by(&self) -> &Arc<dyn User> {
        &self.issued_by
    }

    pub fn aggregate_type(&self) -> &AggregateType {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    /// The version this event takes the aggregate to.
    pub fn aggregate_version(&self) -> i64 {
        self.aggregate_version
    }
}

impl fmt::Display for EventBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} by:{} at:{} {}.{} on:{}",
            self.event_id,
            self.issued_by,
            self.issued_at,
            self.aggregate_type,
            self.event_type,
            self.aggregate_id
        )
    }
}

/// A typed event: header plus domain payload.
#[derive(Debug, Clone)]
pub struct EventEnvelope<A: Aggregate> {
    base: EventBase,
    payload: A::Event,
}

impl<A: Aggregate> EventEnvelope<A> {
    /// Issue a new event for the given aggregate coordinates.
    pub fn new(
        payload: A::Event,
        aggregate_id: Uuid,
        aggregate_version: i64,
        issued_by: Arc<dyn User>,
    ) -> Self {
        let base = EventBase::new(
            A::aggregate_type(),
            aggregate_version,
            payload.event_type(),
            aggregate_id,
            issued_by,
        );
        Self { base, payload }
    }

    /// Assemble an envelope from a rebuilt header and decoded payload.
    pub(crate) fn from_parts(base: EventBase, payload: A::Event) -> Self {
        Self { base, payload }
    }

    pub fn event_id(&self) -> Uuid {
        self.base.event_id()
    }

    pub fn event_type(&self) -> &str {
        self.base.event_type()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.base.issued_at()
    }

    pub fn issued_by(&self) -> &Arc<dyn User> {
        self.base.issued_by()
    }

    pub fn aggregate_type(&self) -> &AggregateType {
        self.base.aggregate_type()
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.base.aggregate_id()
    }

    pub fn aggregate_version(&self) -> i64 {
        self.base.aggregate_version()
    }

    pub fn payload(&self) -> &A::Event {
        &self.payload
    }
}

impl<A: Aggregate> fmt::Display for EventEnvelope<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.base, f)
    }
}

/// Encode a typed event into its stored form. New records are born
/// unpublished; the outbox flag only changes through the repository.
pub fn to_record<A: Aggregate>(
    event: &EventEnvelope<A>,
    registry: &EventRegistry<A>,
) -> Result<EventRecord, RegistryError> {
    let event_data = registry.encode(event.payload())?;

    Ok(EventRecord {
        event_id: event.event_id(),
        event_type: event.event_type().to_string(),
        event_issued_at: event.issued_at(),
        event_issued_by: event.issued_by().to_string(),
        event_data,
        event_published: false,
        aggregate_id: event.aggregate_id(),
        aggregate_type: event.aggregate_type().clone(),
        aggregate_version: event.aggregate_version(),
    })
}

/// Decode a stored record back into a typed event.
pub fn from_record<A: Aggregate>(
    record: &EventRecord,
    registry: &EventRegistry<A>,
    users: &UserFactory,
) -> Result<EventEnvelope<A>, RegistryError> {
    let issued_by = users(&record.event_issued_by)?;
    let base = EventBase::from_record(record, issued_by);

    registry.hydrate(base, &record.event_data)
}

/// Decode a batch of records, failing on the first bad one.
pub fn from_records<A: Aggregate>(
    records: &[EventRecord],
    registry: &EventRegistry<A>,
    users: &UserFactory,
) -> Result<Vec<EventEnvelope<A>>, RegistryError> {
    records
        .iter()
        .map(|record| from_record(record, registry, users))
        .collect()
}
