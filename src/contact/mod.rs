//! Contact domain
//!
//! Demonstration aggregate wired into the kernel by the server binary: an
//! address-book contact with create/rename/re-email/delete commands and a
//! read model fed from the event stream.

pub mod aggregate;
pub mod commands;
pub mod events;
pub mod http;

pub use aggregate::{Contact, ContactError, CONTACT_AGGREGATE_TYPE};
pub use commands::{CreateContact, DeleteContact, SetContactEmail, SetContactName};
pub use events::{
    ContactEvent, CONTACT_CREATED, CONTACT_DELETED, CONTACT_EMAIL_SET, CONTACT_NAME_SET,
};
pub use http::{contact_router, ContactState};

use crate::eventsourcing::error::RegistryError;
use crate::eventsourcing::registry::EventRegistry;
use crate::readmodel::{InMemoryReadModel, UpdatedTypes};

/// Registry with every contact event type registered.
pub fn registry() -> Result<EventRegistry<Contact>, RegistryError> {
    let mut registry = EventRegistry::new();
    registry.register_tagged(CONTACT_CREATED)?;
    registry.register_tagged(CONTACT_NAME_SET)?;
    registry.register_tagged(CONTACT_EMAIL_SET)?;
    registry.register_tagged(CONTACT_DELETED)?;

    Ok(registry)
}

/// Read model projecting live (non-deleted) contacts.
pub fn read_model() -> InMemoryReadModel<Contact> {
    InMemoryReadModel::new(
        CONTACT_CREATED,
        CONTACT_DELETED,
        UpdatedTypes::Only(vec![
            CONTACT_NAME_SET.to_string(),
            CONTACT_EMAIL_SET.to_string(),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_all_event_types() {
        let registry = registry().unwrap();

        for event_type in [
            CONTACT_CREATED,
            CONTACT_NAME_SET,
            CONTACT_EMAIL_SET,
            CONTACT_DELETED,
        ] {
            assert!(registry.is_registered(event_type), "{event_type}");
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = registry().unwrap();

        let err = registry.register_tagged(CONTACT_CREATED).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
    }
}
