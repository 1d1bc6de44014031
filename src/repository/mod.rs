//! Event repository
//!
//! Durable per-aggregate ordered log plus outbox marker table. Records are
//! append-only: nothing is ever mutated except the outbox `published` flag.

mod memory;
mod postgres;

pub use memory::InMemoryEventRepository;
pub use postgres::PgEventRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::eventsourcing::aggregate::AggregateType;
use crate::eventsourcing::error::BoxError;
use crate::eventsourcing::query::EventQuery;

/// Outbox flag values, named for readable call sites.
pub const PUBLISHED: bool = true;
pub const UNPUBLISHED: bool = false;

/// Stored form of an event: header fields plus the JSON-encoded payload and
/// the outbox marker.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_id: Uuid,
    pub event_type: String,
    pub event_issued_at: DateTime<Utc>,
    pub event_issued_by: String,
    pub event_data: serde_json::Value,
    pub event_published: bool,
    pub aggregate_id: Uuid,
    pub aggregate_type: AggregateType,
    pub aggregate_version: i64,
}

/// Errors raised by repository implementations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A concurrent writer already appended this version.
    #[error("version conflict on aggregate {aggregate_id} at version {aggregate_version}")]
    VersionConflict {
        aggregate_id: Uuid,
        aggregate_version: i64,
    },

    /// The underlying storage failed.
    #[error("storage unavailable: {0}")]
    Storage(#[source] BoxError),
}

impl RepositoryError {
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        RepositoryError::Storage(Box::new(err))
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, RepositoryError::VersionConflict { .. })
    }
}

/// Contract every event repository must satisfy.
///
/// Implementations must keep per-aggregate versions contiguous under
/// concurrent writers: appends to different aggregates succeed
/// independently, appends to the same aggregate serialize or fail with
/// [`RepositoryError::VersionConflict`].
///
/// `event_issued_at` is expected to be non-decreasing per aggregate; the
/// kernel stamps events in append order so this holds by construction, and
/// it is not re-checked at the storage boundary.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append all records atomically. When `write_outbox` is set, one
    /// unpublished outbox row is inserted per record in the same
    /// transaction. All-or-nothing.
    async fn save(&self, write_outbox: bool, records: Vec<EventRecord>)
        -> Result<(), RepositoryError>;

    /// Return records matching every set field of `query`, ordered by
    /// `(aggregate_id, aggregate_version)` in the query's direction.
    async fn get(&self, query: &EventQuery) -> Result<Vec<EventRecord>, RepositoryError>;

    /// Return up to `batch_size` records whose outbox row is unpublished,
    /// ascending by aggregate version so per-aggregate order is preserved.
    async fn get_unpublished(&self, batch_size: usize)
        -> Result<Vec<EventRecord>, RepositoryError>;

    /// Flip the outbox flag for the given event ids. Unknown ids are
    /// ignored; re-marking is idempotent.
    async fn mark_as(&self, published: bool, event_ids: &[Uuid]) -> Result<(), RepositoryError>;
}
