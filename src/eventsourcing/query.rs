//! Event queries
//!
//! Filter record for reading back events. Every field is optional; a record
//! matches when it satisfies all set fields. Default ordering is ascending
//! by `(aggregate_id, aggregate_version)`.

use uuid::Uuid;

use super::aggregate::AggregateType;
use crate::repository::EventRecord;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Filter over stored event records.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    aggregate_id: Option<Uuid>,
    aggregate_type: Option<AggregateType>,
    event_type: Option<String>,
    published: Option<bool>,
    issued_by: Option<String>,
    limit: Option<usize>,
    up_to_version: Option<i64>,
    order: SortOrder,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aggregate_id(mut self, aggregate_id: Uuid) -> Self {
        self.aggregate_id = Some(aggregate_id);
        self
    }

    pub fn with_aggregate_type(mut self, aggregate_type: AggregateType) -> Self {
        self.aggregate_type = Some(aggregate_type);
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_published(mut self, published: bool) -> Self {
        self.published = Some(published);
        self
    }

    pub fn with_issued_by(mut self, issued_by: impl Into<String>) -> Self {
        self.issued_by = Some(issued_by.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Keep only events with `aggregate_version <= version`.
    pub fn with_up_to_version(mut self, version: i64) -> Self {
        self.up_to_version = Some(version);
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn aggregate_id(&self) -> Option<Uuid> {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> Option<&AggregateType> {
        self.aggregate_type.as_ref()
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn published(&self) -> Option<bool> {
        self.published
    }

    pub fn issued_by(&self) -> Option<&str> {
        self.issued_by.as_deref()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn up_to_version(&self) -> Option<i64> {
        self.up_to_version
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// Check a record against every set filter field. Limit and ordering are
    /// the repository's concern.
    pub fn matches(&self, record: &EventRecord) -> bool {
        if let Some(aggregate_id) = self.aggregate_id {
            if record.aggregate_id != aggregate_id {
                return false;
            }
        }

        if let Some(aggregate_type) = &self.aggregate_type {
            if record.aggregate_type != *aggregate_type {
                return false;
            }
        }

        if let Some(event_type) = &self.event_type {
            if record.event_type != *event_type {
                return false;
            }
        }

        if let Some(published) = self.published {
            if record.event_published != published {
                return false;
            }
        }

        if let Some(issued_by) = &self.issued_by {
            if record.event_issued_by != *issued_by {
                return false;
            }
        }

        if let Some(up_to_version) = self.up_to_version {
            if record.aggregate_version > up_to_version {
                return false;
            }
        }

        true
    }
}
