//! Error handling module
//!
//! Centralized HTTP error type and response conversion. Kernel errors are
//! classified once here: validation problems map to 400, missing aggregates
//! to 404, lost concurrent writes to 409, everything else to 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::eventsourcing::error::{HandlerError, RegistryError, StoreError};
use crate::repository::RepositoryError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    #[error("Version conflict: concurrent modification detected")]
    VersionConflict,

    // Server errors (5xx)
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<HandlerError> for AppError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::AggregateNotFound(aggregate_id) => {
                AppError::AggregateNotFound(aggregate_id)
            }
            HandlerError::AggregateAlreadyExists
            | HandlerError::InvalidAggregateType { .. }
            | HandlerError::CommandRejected(_) => AppError::InvalidRequest(err.to_string()),
            HandlerError::Store(store) => AppError::from(store),
            HandlerError::InvalidAggregateVersion { .. } | HandlerError::ApplyFailed(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Repository(repo) => AppError::from(repo),
            StoreError::Registry(registry) => AppError::from(registry),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::VersionConflict { .. } => AppError::VersionConflict,
            RepositoryError::Storage(_) => AppError::Storage(err.to_string()),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            AppError::AggregateNotFound(aggregate_id) => (
                StatusCode::NOT_FOUND,
                "aggregate_not_found",
                Some(aggregate_id.to_string()),
            ),

            AppError::VersionConflict => (StatusCode::CONFLICT, "version_conflict", None),

            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }

            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_maps_to_conflict() {
        let err = AppError::from(RepositoryError::VersionConflict {
            aggregate_id: Uuid::new_v4(),
            aggregate_version: 2,
        });

        assert!(matches!(err, AppError::VersionConflict));
    }

    #[test]
    fn test_missing_aggregate_maps_to_not_found() {
        let id = Uuid::new_v4();
        let err = AppError::from(HandlerError::AggregateNotFound(id));

        assert!(matches!(err, AppError::AggregateNotFound(got) if got == id));
    }

    #[test]
    fn test_command_rejection_is_a_client_error() {
        let err = AppError::from(HandlerError::CommandRejected("bad email".into()));

        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}
