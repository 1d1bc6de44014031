//! Admin HTTP adapter
//!
//! Operator endpoints over the admin use-cases.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::eventsourcing::aggregate::{Aggregate, AggregateType};
use crate::eventsourcing::query::EventQuery;
use crate::repository::EventRecord;

use super::usecase::ALL_VERSIONS;
use super::AdminApp;

/// Router exposing the admin surface for one aggregate family.
pub fn admin_router<A: Aggregate>(app: Arc<AdminApp<A>>) -> Router {
    Router::new()
        .route("/v1/aggregates/:aggregate_id", get(load_aggregate::<A>))
        .route(
            "/v1/aggregates/:aggregate_id/republish",
            post(republish_aggregate::<A>),
        )
        .route("/v1/events", get(list_events::<A>))
        .with_state(app)
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct LoadAggregateParams {
    #[serde(default)]
    pub to_version: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AggregateResponse<A: Serialize> {
    pub aggregate_id: Uuid,
    pub aggregate_type: AggregateType,
    pub aggregate_version: i64,
    pub aggregate: A,
}

#[derive(Debug, Serialize)]
pub struct RepublishResponse {
    pub aggregate_id: Uuid,
    pub nb_republished_events: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsParams {
    #[serde(default)]
    pub aggregate_id: Option<Uuid>,
    #[serde(default)]
    pub aggregate_type: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Stored event as presented to operators; the payload stays in its encoded
/// string form.
#[derive(Debug, Serialize)]
pub struct EventJson {
    pub event_id: Uuid,
    pub event_type: String,
    pub event_issued_at: DateTime<Utc>,
    pub event_issued_by: String,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub aggregate_version: i64,
    pub event_data: String,
    pub event_published: bool,
}

impl From<&EventRecord> for EventJson {
    fn from(record: &EventRecord) -> Self {
        Self {
            event_id: record.event_id,
            event_type: record.event_type.clone(),
            event_issued_at: record.event_issued_at,
            event_issued_by: record.event_issued_by.clone(),
            aggregate_id: record.aggregate_id,
            aggregate_type: record.aggregate_type.as_str().to_string(),
            aggregate_version: record.aggregate_version,
            event_data: record.event_data.to_string(),
            event_published: record.event_published,
        }
    }
}

// =========================================================================
// Handlers
// =========================================================================

async fn load_aggregate<A: Aggregate>(
    State(app): State<Arc<AdminApp<A>>>,
    Path(aggregate_id): Path<Uuid>,
    Query(params): Query<LoadAggregateParams>,
) -> Result<Json<AggregateResponse<A>>, AppError> {
    let to_version = params.to_version.unwrap_or(ALL_VERSIONS);
    if to_version < 0 {
        return Err(AppError::InvalidRequest(
            "to_version must be a non-negative version".to_string(),
        ));
    }

    let aggregate = app.load_aggregate(aggregate_id, to_version).await?;

    Ok(Json(AggregateResponse {
        aggregate_id: aggregate.aggregate_id(),
        aggregate_type: A::aggregate_type(),
        aggregate_version: aggregate.aggregate_version(),
        aggregate,
    }))
}

async fn republish_aggregate<A: Aggregate>(
    State(app): State<Arc<AdminApp<A>>>,
    Path(aggregate_id): Path<Uuid>,
) -> Result<Json<RepublishResponse>, AppError> {
    let nb_republished_events = app.republish_aggregate(aggregate_id).await?;

    Ok(Json(RepublishResponse {
        aggregate_id,
        nb_republished_events,
    }))
}

async fn list_events<A: Aggregate>(
    State(app): State<Arc<AdminApp<A>>>,
    Query(params): Query<ListEventsParams>,
) -> Result<Json<Vec<EventJson>>, AppError> {
    let mut query = EventQuery::new();
    if let Some(aggregate_id) = params.aggregate_id {
        query = query.with_aggregate_id(aggregate_id);
    }
    if let Some(aggregate_type) = params.aggregate_type {
        query = query.with_aggregate_type(AggregateType::new(aggregate_type));
    }
    if let Some(event_type) = params.event_type {
        query = query.with_event_type(event_type);
    }
    if let Some(published) = params.published {
        query = query.with_published(published);
    }
    if let Some(limit) = params.limit {
        query = query.with_limit(limit);
    }

    let records = app.list_events(&query).await?;
    let events: Vec<EventJson> = records.iter().map(EventJson::from).collect();

    Ok(Json(events))
}
