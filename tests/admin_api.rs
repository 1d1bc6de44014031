//! Admin HTTP surface tests over the in-memory repository.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

use eventloom::admin::{admin_router, AdminApp};
use eventloom::contact::{self, Contact, CreateContact, SetContactName, CONTACT_CREATED};
use eventloom::eventsourcing::{
    default_user_factory, system_user, Aggregate, CommandHandler, EventStore,
};
use eventloom::repository::{EventRepository, InMemoryEventRepository};

struct Setup {
    app: Router,
    repo: Arc<InMemoryEventRepository>,
    contact_id: Uuid,
}

/// Admin router over a repository seeded with one contact at version 2.
async fn setup() -> Setup {
    let repo = Arc::new(InMemoryEventRepository::new());
    let registry = Arc::new(contact::registry().unwrap());
    let users = default_user_factory();

    let store = EventStore::<Contact>::new(
        Arc::clone(&repo) as Arc<dyn EventRepository>,
        Arc::clone(&registry),
        Arc::clone(&users),
        true,
    );
    let handler = Arc::new(CommandHandler::new(store));

    let created = handler
        .handle(&CreateContact::new(
            "John",
            "Doe",
            "john@example.com",
            system_user(),
        ))
        .await
        .unwrap();
    let contact_id = created.aggregate_id();

    handler
        .handle(&SetContactName::new(
            contact_id,
            "John",
            "Smith",
            system_user(),
        ))
        .await
        .unwrap();

    let admin = Arc::new(AdminApp::new(
        Arc::clone(&repo) as Arc<dyn EventRepository>,
        registry,
        users,
        handler,
        true,
    ));

    Setup {
        app: admin_router(admin),
        repo,
        contact_id,
    }
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    (status, body)
}

#[tokio::test]
async fn test_load_aggregate() {
    let setup = setup().await;

    let (status, body) = get_json(
        setup.app,
        &format!("/v1/aggregates/{}", setup.contact_id),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aggregate_id"], setup.contact_id.to_string());
    assert_eq!(body["aggregate_type"], "contact");
    assert_eq!(body["aggregate_version"], 2);
    assert_eq!(body["aggregate"]["last_name"], "Smith");
}

#[tokio::test]
async fn test_load_aggregate_at_version() {
    let setup = setup().await;

    let (status, body) = get_json(
        setup.app,
        &format!("/v1/aggregates/{}?to_version=1", setup.contact_id),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aggregate_version"], 1);
    assert_eq!(body["aggregate"]["last_name"], "Doe");
}

#[tokio::test]
async fn test_load_aggregate_malformed_id() {
    let setup = setup().await;

    let (status, _) = get_json(setup.app, "/v1/aggregates/not-a-uuid").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_load_aggregate_negative_version() {
    let setup = setup().await;

    let (status, body) = get_json(
        setup.app,
        &format!("/v1/aggregates/{}?to_version=-1", setup.contact_id),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn test_load_aggregate_unknown_id() {
    let setup = setup().await;

    let (status, body) = get_json(
        setup.app,
        &format!("/v1/aggregates/{}", Uuid::new_v4()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "aggregate_not_found");
}

#[tokio::test]
async fn test_republish_aggregate() {
    let setup = setup().await;

    // Drain the outbox first so republish visibly resets it.
    let unpublished = setup.repo.get_unpublished(10).await.unwrap();
    let ids: Vec<Uuid> = unpublished.iter().map(|r| r.event_id).collect();
    setup.repo.mark_as(true, &ids).await.unwrap();
    assert!(setup.repo.get_unpublished(10).await.unwrap().is_empty());

    let response = setup
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/aggregates/{}/republish", setup.contact_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["aggregate_id"], setup.contact_id.to_string());
    assert_eq!(body["nb_republished_events"], 2);

    let unpublished = setup.repo.get_unpublished(10).await.unwrap();
    assert_eq!(unpublished.len(), 2);
    assert_eq!(unpublished[0].aggregate_version, 1);
}

#[tokio::test]
async fn test_list_events() {
    let setup = setup().await;

    let (status, body) = get_json(
        setup.app,
        &format!("/v1/events?aggregate_id={}", setup.contact_id),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 2);

    let first = &events[0];
    assert_eq!(first["event_type"], CONTACT_CREATED);
    assert_eq!(first["aggregate_type"], "contact");
    assert_eq!(first["aggregate_version"], 1);
    assert_eq!(first["event_issued_by"], "system");
    assert_eq!(first["event_published"], false);

    // The payload is presented in its encoded string form.
    let payload: Value =
        serde_json::from_str(first["event_data"].as_str().unwrap()).unwrap();
    assert_eq!(payload["type"], CONTACT_CREATED);
    assert_eq!(payload["email"], "john@example.com");
}

#[tokio::test]
async fn test_list_events_filters() {
    let setup = setup().await;

    let (status, body) = get_json(
        setup.app.clone(),
        &format!("/v1/events?event_type={}", CONTACT_CREATED),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = get_json(setup.app, "/v1/events?published=true").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_events_malformed_query() {
    let setup = setup().await;

    let (status, _) = get_json(setup.app, "/v1/events?published=not-a-bool").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
