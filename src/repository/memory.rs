//! In-memory event repository
//!
//! Satisfies the repository contract with a single read-write lock: shared
//! reads for queries, exclusive writes for appends and outbox flips. Used by
//! tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::eventsourcing::query::{EventQuery, SortOrder};

use super::{EventRecord, EventRepository, RepositoryError};

#[derive(Default)]
struct OutboxRow {
    aggregate_version: i64,
    published: bool,
}

#[derive(Default)]
struct Inner {
    /// All records in append order.
    records: Vec<EventRecord>,
    /// Current max version per aggregate.
    versions: HashMap<Uuid, i64>,
    /// Outbox rows keyed by event id.
    outbox: HashMap<Uuid, OutboxRow>,
}

/// Event repository backed by process memory.
#[derive(Default)]
pub struct InMemoryEventRepository {
    inner: RwLock<Inner>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, for test assertions.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn save(
        &self,
        write_outbox: bool,
        records: Vec<EventRecord>,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write();

        // Compare-and-append: each record must continue its aggregate's
        // version sequence, accounting for earlier records in this batch.
        let mut staged: HashMap<Uuid, i64> = HashMap::new();
        for record in &records {
            let current = *staged
                .entry(record.aggregate_id)
                .or_insert_with(|| inner.versions.get(&record.aggregate_id).copied().unwrap_or(0));

            if record.aggregate_version != current + 1 {
                return Err(RepositoryError::VersionConflict {
                    aggregate_id: record.aggregate_id,
                    aggregate_version: record.aggregate_version,
                });
            }

            debug_assert!(
                inner
                    .records
                    .iter()
                    .filter(|r| r.aggregate_id == record.aggregate_id)
                    .all(|r| r.event_issued_at <= record.event_issued_at),
                "event timestamps must be non-decreasing per aggregate"
            );

            staged.insert(record.aggregate_id, current + 1);
        }

        for record in records {
            inner
                .versions
                .insert(record.aggregate_id, record.aggregate_version);

            if write_outbox {
                inner.outbox.insert(
                    record.event_id,
                    OutboxRow {
                        aggregate_version: record.aggregate_version,
                        published: false,
                    },
                );
            }

            inner.records.push(record);
        }

        Ok(())
    }

    async fn get(&self, query: &EventQuery) -> Result<Vec<EventRecord>, RepositoryError> {
        let inner = self.inner.read();

        let mut matched: Vec<EventRecord> = inner
            .records
            .iter()
            .map(|record| {
                let mut record = record.clone();
                record.event_published = inner
                    .outbox
                    .get(&record.event_id)
                    .map(|row| row.published)
                    .unwrap_or(false);
                record
            })
            .filter(|record| query.matches(record))
            .collect();

        matched.sort_by(|a, b| {
            (a.aggregate_id, a.aggregate_version).cmp(&(b.aggregate_id, b.aggregate_version))
        });
        if query.order() == SortOrder::Descending {
            matched.reverse();
        }

        if let Some(limit) = query.limit() {
            matched.truncate(limit);
        }

        Ok(matched)
    }

    async fn get_unpublished(
        &self,
        batch_size: usize,
    ) -> Result<Vec<EventRecord>, RepositoryError> {
        let inner = self.inner.read();

        let mut pending: Vec<(Uuid, i64)> = inner
            .outbox
            .iter()
            .filter(|(_, row)| !row.published)
            .map(|(event_id, row)| (*event_id, row.aggregate_version))
            .collect();

        pending.sort_by_key(|(_, version)| *version);
        pending.truncate(batch_size);

        let records = pending
            .iter()
            .filter_map(|(event_id, _)| {
                inner
                    .records
                    .iter()
                    .find(|record| record.event_id == *event_id)
                    .cloned()
            })
            .collect();

        Ok(records)
    }

    async fn mark_as(&self, published: bool, event_ids: &[Uuid]) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write();

        for event_id in event_ids {
            if let Some(row) = inner.outbox.get_mut(event_id) {
                row.published = published;
            }
        }

        Ok(())
    }
}
