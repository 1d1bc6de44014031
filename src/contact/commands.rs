//! Contact commands

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::eventsourcing::aggregate::AggregateType;
use crate::eventsourcing::command::{ensure_new, ensure_not_new, Command, CommandBase};
use crate::eventsourcing::error::CommandError;
use crate::eventsourcing::user::User;

use super::aggregate::{Contact, ContactError, CONTACT_AGGREGATE_TYPE};
use super::events::ContactEvent;

fn validate_email(email: &str) -> Result<(), CommandError> {
    if !email.contains('@') {
        return Err(CommandError::rejected(ContactError::InvalidEmail(
            email.to_string(),
        )));
    }

    Ok(())
}

fn validate_name(first_name: &str, last_name: &str) -> Result<(), CommandError> {
    if first_name.is_empty() && last_name.is_empty() {
        return Err(CommandError::rejected(ContactError::EmptyName));
    }

    Ok(())
}

fn ensure_not_deleted(contact: &Contact) -> Result<(), CommandError> {
    if contact.is_deleted() {
        return Err(CommandError::rejected(ContactError::Deleted));
    }

    Ok(())
}

/// Create a new contact. Mints the aggregate id at construction time.
#[derive(Debug, Clone)]
pub struct CreateContact {
    base: CommandBase,
    first_name: String,
    last_name: String,
    email: String,
}

impl CreateContact {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        issued_by: Arc<dyn User>,
    ) -> Self {
        Self {
            base: CommandBase::new(Uuid::new_v4(), CONTACT_AGGREGATE_TYPE, issued_by),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }
}

impl Command<Contact> for CreateContact {
    fn aggregate_id(&self) -> Uuid {
        self.base.aggregate_id()
    }

    fn aggregate_type(&self) -> AggregateType {
        self.base.aggregate_type()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.base.created_at()
    }

    fn issued_by(&self) -> Arc<dyn User> {
        self.base.issued_by()
    }

    fn apply(&self, contact: &mut Contact) -> Result<Vec<ContactEvent>, CommandError> {
        ensure_new(contact)?;
        validate_name(&self.first_name, &self.last_name)?;
        validate_email(&self.email)?;

        Ok(vec![ContactEvent::Created {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
        }])
    }
}

/// Rename an existing contact.
#[derive(Debug, Clone)]
pub struct SetContactName {
    base: CommandBase,
    first_name: String,
    last_name: String,
}

impl SetContactName {
    pub fn new(
        aggregate_id: Uuid,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        issued_by: Arc<dyn User>,
    ) -> Self {
        Self {
            base: CommandBase::new(aggregate_id, CONTACT_AGGREGATE_TYPE, issued_by),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

impl Command<Contact> for SetContactName {
    fn aggregate_id(&self) -> Uuid {
        self.base.aggregate_id()
    }

    fn aggregate_type(&self) -> AggregateType {
        self.base.aggregate_type()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.base.created_at()
    }

    fn issued_by(&self) -> Arc<dyn User> {
        self.base.issued_by()
    }

    fn apply(&self, contact: &mut Contact) -> Result<Vec<ContactEvent>, CommandError> {
        ensure_not_new(contact)?;
        ensure_not_deleted(contact)?;
        validate_name(&self.first_name, &self.last_name)?;

        Ok(vec![ContactEvent::NameSet {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }])
    }
}

/// Change a contact's email address.
#[derive(Debug, Clone)]
pub struct SetContactEmail {
    base: CommandBase,
    email: String,
}

impl SetContactEmail {
    pub fn new(aggregate_id: Uuid, email: impl Into<String>, issued_by: Arc<dyn User>) -> Self {
        Self {
            base: CommandBase::new(aggregate_id, CONTACT_AGGREGATE_TYPE, issued_by),
            email: email.into(),
        }
    }
}

impl Command<Contact> for SetContactEmail {
    fn aggregate_id(&self) -> Uuid {
        self.base.aggregate_id()
    }

    fn aggregate_type(&self) -> AggregateType {
        self.base.aggregate_type()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.base.created_at()
    }

    fn issued_by(&self) -> Arc<dyn User> {
        self.base.issued_by()
    }

    fn apply(&self, contact: &mut Contact) -> Result<Vec<ContactEvent>, CommandError> {
        ensure_not_new(contact)?;
        ensure_not_deleted(contact)?;
        validate_email(&self.email)?;

        Ok(vec![ContactEvent::EmailSet {
            email: self.email.clone(),
        }])
    }
}

/// Mark a contact as deleted. The event history stays.
#[derive(Debug, Clone)]
pub struct DeleteContact {
    base: CommandBase,
}

impl DeleteContact {
    pub fn new(aggregate_id: Uuid, issued_by: Arc<dyn User>) -> Self {
        Self {
            base: CommandBase::new(aggregate_id, CONTACT_AGGREGATE_TYPE, issued_by),
        }
    }
}

impl Command<Contact> for DeleteContact {
    fn aggregate_id(&self) -> Uuid {
        self.base.aggregate_id()
    }

    fn aggregate_type(&self) -> AggregateType {
        self.base.aggregate_type()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.base.created_at()
    }

    fn issued_by(&self) -> Arc<dyn User> {
        self.base.issued_by()
    }

    fn apply(&self, contact: &mut Contact) -> Result<Vec<ContactEvent>, CommandError> {
        ensure_not_new(contact)?;
        ensure_not_deleted(contact)?;

        Ok(vec![ContactEvent::Deleted])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventsourcing::aggregate::Aggregate;
    use crate::eventsourcing::user::system_user;

    #[test]
    fn test_create_contact_on_fresh_aggregate() {
        let command = CreateContact::new("Ada", "Lovelace", "ada@example.com", system_user());
        let mut contact = Contact::default();

        let events = command.apply(&mut contact).unwrap();

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ContactEvent::Created { .. }));
    }

    #[test]
    fn test_create_contact_rejects_bad_email() {
        let command = CreateContact::new("Ada", "Lovelace", "not-an-email", system_user());
        let mut contact = Contact::default();

        let err = command.apply(&mut contact).unwrap_err();
        assert!(matches!(err, CommandError::Rejected(_)));
    }

    #[test]
    fn test_mutation_requires_existing_aggregate() {
        let command = SetContactName::new(Uuid::new_v4(), "Ada", "King", system_user());
        let mut contact = Contact::default();

        let err = command.apply(&mut contact).unwrap_err();
        assert!(matches!(err, CommandError::AggregateNotFound));
    }

    #[test]
    fn test_create_rejects_existing_aggregate() {
        let create = CreateContact::new("Ada", "Lovelace", "ada@example.com", system_user());
        let mut contact = Contact::default();

        // Fold the creation event so the aggregate exists.
        let events = create.apply(&mut contact).unwrap();
        let envelope = crate::eventsourcing::event::EventEnvelope::new(
            events[0].clone(),
            create.aggregate_id(),
            1,
            system_user(),
        );
        contact.apply(&envelope).unwrap();

        let again = CreateContact::new("Ada", "Lovelace", "ada@example.com", system_user());
        let mut existing = contact.clone();
        let err = again.apply(&mut existing).unwrap_err();

        assert!(matches!(err, CommandError::AggregateAlreadyExists));
    }
}
