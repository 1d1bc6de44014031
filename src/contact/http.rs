//! Contact HTTP API
//!
//! Thin command adapter: requests become commands, the handler does the
//! rest. Reads are served from the in-memory read model, which lags the
//! write side by the outbox round-trip.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::eventsourcing::aggregate::Aggregate;
use crate::eventsourcing::handler::CommandHandler;
use crate::eventsourcing::user::{system_user, AuthenticatedUser, User};
use crate::readmodel::InMemoryReadModel;

use super::aggregate::Contact;
use super::commands::{CreateContact, DeleteContact, SetContactEmail, SetContactName};

const USER_HEADER: &str = "x-user-id";

/// Shared state of the contact API.
#[derive(Clone)]
pub struct ContactState {
    pub handler: Arc<CommandHandler<Contact>>,
    pub read_model: Arc<InMemoryReadModel<Contact>>,
}

/// Router exposing the contact command API.
pub fn contact_router(state: ContactState) -> Router {
    Router::new()
        .route("/v1/contacts", post(create_contact).get(list_contacts))
        .route("/v1/contacts/:contact_id/name", put(set_contact_name))
        .route("/v1/contacts/:contact_id/email", put(set_contact_email))
        .route("/v1/contacts/:contact_id", delete(delete_contact))
        .with_state(state)
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateContactRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SetNameRequest {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SetEmailRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub contact_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub version: i64,
}

impl From<&Contact> for ContactResponse {
    fn from(contact: &Contact) -> Self {
        Self {
            contact_id: contact.aggregate_id(),
            first_name: contact.first_name().to_string(),
            last_name: contact.last_name().to_string(),
            email: contact.email().to_string(),
            version: contact.aggregate_version(),
        }
    }
}

/// Issuer from the `X-User-Id` header; internal calls fall back to the
/// system user.
fn issued_by(headers: &HeaderMap) -> Result<Arc<dyn User>, AppError> {
    let Some(raw) = headers.get(USER_HEADER) else {
        return Ok(system_user());
    };

    let raw = raw
        .to_str()
        .map_err(|_| AppError::InvalidRequest("malformed X-User-Id header".to_string()))?;
    let user_id: Uuid = raw
        .parse()
        .map_err(|_| AppError::InvalidRequest("malformed X-User-Id header".to_string()))?;

    Ok(Arc::new(AuthenticatedUser(user_id)))
}

// =========================================================================
// Handlers
// =========================================================================

async fn create_contact(
    State(state): State<ContactState>,
    headers: HeaderMap,
    Json(request): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<ContactResponse>), AppError> {
    let command = CreateContact::new(
        request.first_name,
        request.last_name,
        request.email,
        issued_by(&headers)?,
    );

    let contact = state.handler.handle(&command).await?;

    Ok((StatusCode::CREATED, Json(ContactResponse::from(&contact))))
}

async fn set_contact_name(
    State(state): State<ContactState>,
    Path(contact_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<SetNameRequest>,
) -> Result<Json<ContactResponse>, AppError> {
    let command = SetContactName::new(
        contact_id,
        request.first_name,
        request.last_name,
        issued_by(&headers)?,
    );

    let contact = state.handler.handle(&command).await?;

    Ok(Json(ContactResponse::from(&contact)))
}

async fn set_contact_email(
    State(state): State<ContactState>,
    Path(contact_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<SetEmailRequest>,
) -> Result<Json<ContactResponse>, AppError> {
    let command = SetContactEmail::new(contact_id, request.email, issued_by(&headers)?);

    let contact = state.handler.handle(&command).await?;

    Ok(Json(ContactResponse::from(&contact)))
}

async fn delete_contact(
    State(state): State<ContactState>,
    Path(contact_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let command = DeleteContact::new(contact_id, issued_by(&headers)?);

    state.handler.handle(&command).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_contacts(State(state): State<ContactState>) -> Json<Vec<ContactResponse>> {
    let contacts = state.read_model.find(None);

    Json(contacts.iter().map(ContactResponse::from).collect())
}
