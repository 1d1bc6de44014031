//! Postgres event repository
//!
//! Stores events in an `events` table with a companion `events_outbox`
//! table, appended together in one transaction. The unique index on
//! `(aggregate_id, aggregate_version)` is the on-disk version guard:
//! concurrent writers surface as a unique violation which is mapped to
//! `VersionConflict`.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::eventsourcing::aggregate::AggregateType;
use crate::eventsourcing::query::{EventQuery, SortOrder};

use super::{EventRecord, EventRepository, RepositoryError};

/// Postgres `unique_violation` error code.
const UNIQUE_VIOLATION: &str = "23505";

const SELECT_RECORD: &str = "SELECT e.event_id, e.event_type, e.event_issued_at, \
     e.event_issued_by, e.event_data, e.aggregate_id, e.aggregate_type, e.aggregate_version, \
     COALESCE(o.published, FALSE) AS event_published \
     FROM events e LEFT JOIN events_outbox o ON o.event_id = e.event_id";

/// Event repository backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn save(
        &self,
        write_outbox: bool,
        records: Vec<EventRecord>,
    ) -> Result<(), RepositoryError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(RepositoryError::storage)?;

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO events (
                    event_id, event_type, event_issued_at, event_issued_by,
                    event_data, aggregate_id, aggregate_type, aggregate_version
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(record.event_id)
            .bind(&record.event_type)
            .bind(record.event_issued_at)
            .bind(&record.event_issued_by)
            .bind(&record.event_data)
            .bind(record.aggregate_id)
            .bind(record.aggregate_type.as_str())
            .bind(record.aggregate_version)
            .execute(&mut *tx)
            .await
            .map_err(|err| map_insert_error(record, err))?;

            if write_outbox {
                sqlx::query(
                    r#"
                    INSERT INTO events_outbox (event_id, published, aggregate_version)
                    VALUES ($1, FALSE, $2)
                    "#,
                )
                .bind(record.event_id)
                .bind(record.aggregate_version)
                .execute(&mut *tx)
                .await
                .map_err(RepositoryError::storage)?;
            }
        }

        tx.commit().await.map_err(RepositoryError::storage)?;

        Ok(())
    }

    async fn get(&self, query: &EventQuery) -> Result<Vec<EventRecord>, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_RECORD);
        builder.push(" WHERE TRUE");

        if let Some(aggregate_id) = query.aggregate_id() {
            builder.push(" AND e.aggregate_id = ").push_bind(aggregate_id);
        }
        if let Some(aggregate_type) = query.aggregate_type() {
            builder
                .push(" AND e.aggregate_type = ")
                .push_bind(aggregate_type.as_str().to_string());
        }
        if let Some(event_type) = query.event_type() {
            builder
                .push(" AND e.event_type = ")
                .push_bind(event_type.to_string());
        }
        if let Some(published) = query.published() {
            builder
                .push(" AND COALESCE(o.published, FALSE) = ")
                .push_bind(published);
        }
        if let Some(issued_by) = query.issued_by() {
            builder
                .push(" AND e.event_issued_by = ")
                .push_bind(issued_by.to_string());
        }
        if let Some(up_to_version) = query.up_to_version() {
            builder
                .push(" AND e.aggregate_version <= ")
                .push_bind(up_to_version);
        }

        builder.push(match query.order() {
            SortOrder::Ascending => " ORDER BY e.aggregate_id ASC, e.aggregate_version ASC",
            SortOrder::Descending => " ORDER BY e.aggregate_id DESC, e.aggregate_version DESC",
        });

        if let Some(limit) = query.limit() {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::storage)?;

        rows.iter().map(row_to_record).collect()
    }

    async fn get_unpublished(
        &self,
        batch_size: usize,
    ) -> Result<Vec<EventRecord>, RepositoryError> {
        let event_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT event_id FROM events_outbox
            WHERE published = FALSE
            ORDER BY aggregate_version ASC
            LIMIT $1
            "#,
        )
        .bind(batch_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::storage)?;

        if event_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{SELECT_RECORD} WHERE e.event_id = ANY($1) ORDER BY e.aggregate_version ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(&event_ids[..])
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::storage)?;

        rows.iter().map(row_to_record).collect()
    }

    async fn mark_as(&self, published: bool, event_ids: &[Uuid]) -> Result<(), RepositoryError> {
        if event_ids.is_empty() {
            return Ok(());
        }

        sqlx::query("UPDATE events_outbox SET published = $1 WHERE event_id = ANY($2)")
            .bind(published)
            .bind(event_ids)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::storage)?;

        Ok(())
    }
}

fn map_insert_error(record: &EventRecord, err: sqlx::Error) -> RepositoryError {
    let is_unique_violation = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false);

    if is_unique_violation {
        return RepositoryError::VersionConflict {
            aggregate_id: record.aggregate_id,
            aggregate_version: record.aggregate_version,
        };
    }

    RepositoryError::storage(err)
}

fn row_to_record(row: &PgRow) -> Result<EventRecord, RepositoryError> {
    let aggregate_type: String = row
        .try_get("aggregate_type")
        .map_err(RepositoryError::storage)?;

    Ok(EventRecord {
        event_id: row.try_get("event_id").map_err(RepositoryError::storage)?,
        event_type: row.try_get("event_type").map_err(RepositoryError::storage)?,
        event_issued_at: row
            .try_get("event_issued_at")
            .map_err(RepositoryError::storage)?,
        event_issued_by: row
            .try_get("event_issued_by")
            .map_err(RepositoryError::storage)?,
        event_data: row.try_get("event_data").map_err(RepositoryError::storage)?,
        event_published: row
            .try_get("event_published")
            .map_err(RepositoryError::storage)?,
        aggregate_id: row
            .try_get("aggregate_id")
            .map_err(RepositoryError::storage)?,
        aggregate_type: AggregateType::new(aggregate_type),
        aggregate_version: row
            .try_get("aggregate_version")
            .map_err(RepositoryError::storage)?,
    })
}
