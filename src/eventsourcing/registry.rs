//! Event registry
//!
//! Maps event type strings to payload decoders. Payloads must be decoded
//! before their concrete type is known, so this is the one place where
//! dispatch is dynamic: everything downstream of `hydrate` is typed again.
//!
//! A single payload encoding is used process-wide: JSON.

use std::collections::HashMap;

use serde::de::Error as _;

use super::aggregate::Aggregate;
use super::error::RegistryError;
use super::event::{EventBase, EventEnvelope, EventPayload};

type DecodeFn<A> =
    Box<dyn Fn(&serde_json::Value) -> Result<<A as Aggregate>::Event, serde_json::Error> + Send + Sync>;

/// Registry of the event types one aggregate family can produce.
///
/// Built once at startup and shared read-only afterwards.
pub struct EventRegistry<A: Aggregate> {
    decoders: HashMap<String, DecodeFn<A>>,
}

impl<A: Aggregate> EventRegistry<A> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a decoder factory for an event type.
    ///
    /// Registering the same type twice is a configuration error and fails so
    /// it is caught at startup.
    pub fn register<F>(&mut self, event_type: &str, decode: F) -> Result<(), RegistryError>
    where
        F: Fn(&serde_json::Value) -> Result<A::Event, serde_json::Error> + Send + Sync + 'static,
    {
        if self.decoders.contains_key(event_type) {
            return Err(RegistryError::AlreadyRegistered(event_type.to_string()));
        }

        self.decoders.insert(event_type.to_string(), Box::new(decode));
        Ok(())
    }

    /// Register an event type decoded through the payload enum's own tagged
    /// deserializer. This is the common case for `#[serde(tag = "type")]`
    /// payloads.
    pub fn register_tagged(&mut self, event_type: &str) -> Result<(), RegistryError> {
        self.register(event_type, |data| serde_json::from_value(data.clone()))
    }

    pub fn is_registered(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Encode a payload into its stored JSON form.
    pub fn encode(&self, payload: &A::Event) -> Result<serde_json::Value, RegistryError> {
        serde_json::to_value(payload).map_err(|source| RegistryError::EncodeFailed {
            event_type: payload.event_type().to_string(),
            source,
        })
    }

    /// Rebuild a typed event from a stored header and payload.
    pub fn hydrate(
        &self,
        base: EventBase,
        data: &serde_json::Value,
    ) -> Result<EventEnvelope<A>, RegistryError> {
        let decode = self
            .decoders
            .get(base.event_type())
            .ok_or_else(|| RegistryError::UnknownEventType(base.event_type().to_string()))?;

        let payload = decode(data).map_err(|source| RegistryError::DecodeFailed {
            event_type: base.event_type().to_string(),
            source,
        })?;

        // A payload whose own tag disagrees with the stored header would
        // corrupt replay; treat it as a decode failure.
        if payload.event_type() != base.event_type() {
            return Err(RegistryError::DecodeFailed {
                event_type: base.event_type().to_string(),
                source: serde_json::Error::custom(format!(
                    "payload decoded as {}",
                    payload.event_type()
                )),
            });
        }

        Ok(EventEnvelope::from_parts(base, payload))
    }
}

impl<A: Aggregate> Default for EventRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{self, Contact, ContactEvent, CONTACT_NAME_SET};
    use crate::eventsourcing::user::system_user;
    use uuid::Uuid;

    fn base(event_type: &str) -> EventBase {
        EventBase::new(
            Contact::aggregate_type(),
            1,
            event_type,
            Uuid::new_v4(),
            system_user(),
        )
    }

    #[test]
    fn test_encode_hydrate_round_trip() {
        let registry = contact::registry().unwrap();
        let payload = ContactEvent::NameSet {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        };

        let data = registry.encode(&payload).unwrap();
        let event = registry.hydrate(base(CONTACT_NAME_SET), &data).unwrap();

        assert_eq!(*event.payload(), payload);
        assert_eq!(event.event_type(), CONTACT_NAME_SET);
        assert_eq!(event.aggregate_version(), 1);
    }

    #[test]
    fn test_hydrate_unknown_type() {
        let registry = EventRegistry::<Contact>::new();

        let err = registry
            .hydrate(base(CONTACT_NAME_SET), &serde_json::json!({}))
            .unwrap_err();

        assert!(matches!(err, RegistryError::UnknownEventType(ref t) if t == CONTACT_NAME_SET));
    }

    #[test]
    fn test_hydrate_decode_failure() {
        let registry = contact::registry().unwrap();

        let err = registry
            .hydrate(base(CONTACT_NAME_SET), &serde_json::json!({"type": "garbage"}))
            .unwrap_err();

        assert!(matches!(err, RegistryError::DecodeFailed { .. }));
    }

    #[test]
    fn test_hydrate_rejects_mismatched_header() {
        let registry = contact::registry().unwrap();

        // Payload tagged as a different type than the stored header.
        let data = serde_json::json!({"type": "contact.deleted"});
        let err = registry.hydrate(base(CONTACT_NAME_SET), &data).unwrap_err();

        assert!(matches!(err, RegistryError::DecodeFailed { .. }));
    }
}
