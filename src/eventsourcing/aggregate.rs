//! Aggregate model
//!
//! An aggregate is a consistency boundary whose state is fully determined by
//! its ordered event history. Implementations start from `Default` (id nil,
//! version 0) and fold events in version order.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EventEnvelope;

/// Short string identifier for a family of aggregates (e.g. `"contact"`).
/// Unique within a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateType(Cow<'static, str>);

impl AggregateType {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregate trait that all event-sourced entities must implement.
///
/// State is derived from events, never mutated directly: replaying the same
/// history always yields the same aggregate. A `Default` value represents a
/// not-yet-created aggregate with a nil id at version 0; the first persisted
/// event takes it to version 1.
pub trait Aggregate: Default + Clone + Send + Sync + Serialize + 'static {
    /// The typed payloads of the events this aggregate handles.
    type Event: super::event::EventPayload;

    /// Domain error raised when an event cannot be applied.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The aggregate type name, constant for the whole family.
    fn aggregate_type() -> AggregateType;

    /// The aggregate id. Nil signals "not yet created".
    fn aggregate_id(&self) -> Uuid;

    /// The number of events applied so far.
    fn aggregate_version(&self) -> i64;

    /// Apply an event, advancing the aggregate to the event's version.
    ///
    /// Implementations must take their version and timestamps from the
    /// envelope so replay stays deterministic.
    fn apply(&mut self, event: &EventEnvelope<Self>) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_type_display() {
        let t = AggregateType::from_static("contact");
        assert_eq!(t.as_str(), "contact");
        assert_eq!(t.to_string(), "contact");
        assert_eq!(t, AggregateType::new("contact".to_string()));
    }

    #[test]
    fn test_aggregate_type_serde_transparent() {
        let t = AggregateType::from_static("contact");
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"contact\"");

        let back: AggregateType = serde_json::from_str("\"contact\"").unwrap();
        assert_eq!(back, t);
    }
}
