//! Contact events

use serde::{Deserialize, Serialize};

use crate::eventsourcing::event::EventPayload;

pub const CONTACT_CREATED: &str = "contact.created";
pub const CONTACT_NAME_SET: &str = "contact.name_set";
pub const CONTACT_EMAIL_SET: &str = "contact.email_set";
pub const CONTACT_DELETED: &str = "contact.deleted";

/// Everything that can happen to a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContactEvent {
    /// Contact was created
    #[serde(rename = "contact.created")]
    Created {
        first_name: String,
        last_name: String,
        email: String,
    },

    /// Contact was renamed
    #[serde(rename = "contact.name_set")]
    NameSet {
        first_name: String,
        last_name: String,
    },

    /// Contact email address was changed
    #[serde(rename = "contact.email_set")]
    EmailSet { email: String },

    /// Contact was deleted (terminal; the history stays)
    #[serde(rename = "contact.deleted")]
    Deleted,
}

impl EventPayload for ContactEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ContactEvent::Created { .. } => CONTACT_CREATED,
            ContactEvent::NameSet { .. } => CONTACT_NAME_SET,
            ContactEvent::EmailSet { .. } => CONTACT_EMAIL_SET,
            ContactEvent::Deleted => CONTACT_DELETED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_matches_serde_tag() {
        let event = ContactEvent::NameSet {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.event_type());
    }

    #[test]
    fn test_round_trip_all_variants() {
        let events = vec![
            ContactEvent::Created {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            },
            ContactEvent::NameSet {
                first_name: "Ada".to_string(),
                last_name: "King".to_string(),
            },
            ContactEvent::EmailSet {
                email: "ada@king.example".to_string(),
            },
            ContactEvent::Deleted,
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            let back: ContactEvent = serde_json::from_value(value).unwrap();
            assert_eq!(back, event);
        }
    }
}
