//! Commands
//!
//! A command is an intent to change one aggregate. It is validated against
//! the aggregate's current state and produces the events that record the
//! change. Commands are ephemeral and never stored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::aggregate::{Aggregate, AggregateType};
use super::error::CommandError;
use super::user::User;

/// A command targeting one aggregate.
pub trait Command<A: Aggregate>: Send + Sync {
    /// The targeted aggregate. Create-style commands mint a fresh id.
    fn aggregate_id(&self) -> Uuid;

    fn aggregate_type(&self) -> AggregateType;

    fn created_at(&self) -> DateTime<Utc>;

    fn issued_by(&self) -> Arc<dyn User>;

    /// Validate the command against the hydrated aggregate and return the
    /// newly emitted event payloads. The command may also mutate the
    /// aggregate in place, but the returned events are authoritative.
    fn apply(&self, aggregate: &mut A) -> Result<Vec<A::Event>, CommandError>;
}

/// Common fields embedded by concrete commands.
#[derive(Debug, Clone)]
pub struct CommandBase {
    aggregate_id: Uuid,
    aggregate_type: AggregateType,
    created_at: DateTime<Utc>,
    issued_by: Arc<dyn User>,
}

impl CommandBase {
    pub fn new(aggregate_id: Uuid, aggregate_type: AggregateType, issued_by: Arc<dyn User>) -> Self {
        Self {
            aggregate_id,
            aggregate_type,
            created_at: Utc::now(),
            issued_by,
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> AggregateType {
        self.aggregate_type.clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn issued_by(&self) -> Arc<dyn User> {
        Arc::clone(&self.issued_by)
    }
}

/// Precondition for create-style commands: the aggregate must not exist yet.
pub fn ensure_new<A: Aggregate>(aggregate: &A) -> Result<(), CommandError> {
    if aggregate.aggregate_id() != Uuid::nil() || aggregate.aggregate_version() != 0 {
        return Err(CommandError::AggregateAlreadyExists);
    }

    Ok(())
}

/// Precondition for mutation commands: the aggregate must have a history.
pub fn ensure_not_new<A: Aggregate>(aggregate: &A) -> Result<(), CommandError> {
    if aggregate.aggregate_id() == Uuid::nil() || aggregate.aggregate_version() == 0 {
        return Err(CommandError::AggregateNotFound);
    }

    Ok(())
}
