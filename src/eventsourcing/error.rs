//! Event sourcing errors
//!
//! Error types for the kernel. Each failure mode keeps a distinct identity
//! so callers can react to it (retry a version conflict, back off on a
//! decode failure) instead of matching on strings.

use uuid::Uuid;

use super::aggregate::AggregateType;
use super::user::InvalidUser;
use crate::repository::RepositoryError;

/// Boxed domain error carried through the kernel without losing its source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the event registry and its payload codec.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No factory was registered for this event type.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The stored payload did not parse into the registered event type.
    #[error("failed to decode {event_type} payload: {source}")]
    DecodeFailed {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// The payload could not be encoded for storage.
    #[error("failed to encode {event_type} payload: {source}")]
    EncodeFailed {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// Duplicate registration is a configuration error caught at startup.
    #[error("event type already registered: {0}")]
    AlreadyRegistered(String),

    /// The stored issuer string could not be rebuilt into a user.
    #[error("invalid event issuer: {0}")]
    InvalidIssuer(#[from] InvalidUser),
}

/// Errors surfaced by the typed event store facade.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl StoreError {
    /// Check whether this error is a lost concurrent append.
    pub fn is_version_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::Repository(RepositoryError::VersionConflict { .. })
        )
    }
}

/// Errors returned by a command's precondition checks and apply step.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Create-style command on an aggregate that already has events.
    #[error("aggregate already exists")]
    AggregateAlreadyExists,

    /// Mutation command on an aggregate with no history.
    #[error("aggregate not found")]
    AggregateNotFound,

    /// Domain-level rejection supplied by the embedder.
    #[error(transparent)]
    Rejected(BoxError),
}

impl CommandError {
    /// Wrap a domain error as a command rejection.
    pub fn rejected(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        CommandError::Rejected(Box::new(err))
    }
}

/// Errors surfaced by the command handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The command targets a different aggregate family than the handler.
    #[error("invalid aggregate type: expected {expected}, got {got}")]
    InvalidAggregateType {
        expected: AggregateType,
        got: AggregateType,
    },

    #[error("aggregate already exists")]
    AggregateAlreadyExists,

    #[error("aggregate {0} not found")]
    AggregateNotFound(Uuid),

    /// An event's version does not continue the aggregate's sequence.
    #[error("invalid aggregate version: expected {expected}, got {got}")]
    InvalidAggregateVersion { expected: i64, got: i64 },

    /// The aggregate refused an event during replay.
    #[error("failed to apply event: {0}")]
    ApplyFailed(#[source] BoxError),

    /// The command's own validation rejected the operation.
    #[error("command rejected: {0}")]
    CommandRejected(#[source] BoxError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HandlerError {
    /// Check whether this error is a lost concurrent append.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, HandlerError::Store(e) if e.is_version_conflict())
    }

    pub(crate) fn from_command(aggregate_id: Uuid, err: CommandError) -> Self {
        match err {
            CommandError::AggregateAlreadyExists => HandlerError::AggregateAlreadyExists,
            CommandError::AggregateNotFound => HandlerError::AggregateNotFound(aggregate_id),
            CommandError::Rejected(source) => HandlerError::CommandRejected(source),
        }
    }
}
