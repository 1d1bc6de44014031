//! Contact aggregate
//!
//! State is derived from events, never directly mutated. Deletion is a
//! terminal event: the aggregate keeps its history and only carries a
//! deletion timestamp.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::eventsourcing::aggregate::{Aggregate, AggregateType};
use crate::eventsourcing::event::EventEnvelope;

use super::events::ContactEvent;

pub const CONTACT_AGGREGATE_TYPE: AggregateType = AggregateType::from_static("contact");

/// Errors raised when contact state refuses an event or a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("contact is deleted")]
    Deleted,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("first and last name cannot both be empty")]
    EmptyName,
}

/// A person in the address book.
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    version: i64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            version: 0,
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }
}

impl Contact {
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Aggregate for Contact {
    type Event = ContactEvent;
    type Error = ContactError;

    fn aggregate_type() -> AggregateType {
        CONTACT_AGGREGATE_TYPE
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn aggregate_version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &EventEnvelope<Self>) -> Result<(), ContactError> {
        match event.payload() {
            ContactEvent::Created {
                first_name,
                last_name,
                email,
            } => {
                self.id = event.aggregate_id();
                self.first_name = first_name.clone();
                self.last_name = last_name.clone();
                self.email = email.clone();
                self.created_at = Some(event.issued_at());
            }

            ContactEvent::NameSet {
                first_name,
                last_name,
            } => {
                self.first_name = first_name.clone();
                self.last_name = last_name.clone();
            }

            ContactEvent::EmailSet { email } => {
                self.email = email.clone();
            }

            ContactEvent::Deleted => {
                self.deleted_at = Some(event.issued_at());
            }
        }

        self.version = event.aggregate_version();
        self.updated_at = Some(event.issued_at());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventsourcing::user::system_user;

    fn envelope(payload: ContactEvent, id: Uuid, version: i64) -> EventEnvelope<Contact> {
        EventEnvelope::new(payload, id, version, system_user())
    }

    #[test]
    fn test_contact_created() {
        let id = Uuid::new_v4();
        let mut contact = Contact::default();

        contact
            .apply(&envelope(
                ContactEvent::Created {
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    email: "ada@example.com".to_string(),
                },
                id,
                1,
            ))
            .unwrap();

        assert_eq!(contact.aggregate_id(), id);
        assert_eq!(contact.aggregate_version(), 1);
        assert_eq!(contact.first_name(), "Ada");
        assert_eq!(contact.email(), "ada@example.com");
        assert!(contact.created_at().is_some());
        assert!(!contact.is_deleted());
    }

    #[test]
    fn test_contact_rename_and_delete() {
        let id = Uuid::new_v4();
        let mut contact = Contact::default();

        contact
            .apply(&envelope(
                ContactEvent::Created {
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    email: "ada@example.com".to_string(),
                },
                id,
                1,
            ))
            .unwrap();
        contact
            .apply(&envelope(
                ContactEvent::NameSet {
                    first_name: "Ada".to_string(),
                    last_name: "King".to_string(),
                },
                id,
                2,
            ))
            .unwrap();
        contact.apply(&envelope(ContactEvent::Deleted, id, 3)).unwrap();

        assert_eq!(contact.last_name(), "King");
        assert_eq!(contact.aggregate_version(), 3);
        assert!(contact.is_deleted());
    }
}
