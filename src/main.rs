//! eventloom server
//!
//! Wires the contact domain into the kernel and serves the admin surface
//! plus the contact command API. The outbox publisher and the stream
//! dispatcher run alongside the HTTP server and stop with it.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eventloom::admin::{admin_router, AdminApp};
use eventloom::contact::{self, Contact, ContactState};
use eventloom::eventsourcing::{default_user_factory, CommandHandler, EventStore};
use eventloom::publisher::OutboxPublisher;
use eventloom::repository::{EventRepository, PgEventRepository};
use eventloom::stream::InMemoryEventStream;
use eventloom::{db, Config};

/// Queue depth of the in-process event stream.
const STREAM_BUFFER: usize = 256;

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventloom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting eventloom server");
    tracing::info!("Connecting to database...");

    let pool = db::connect(&config).await?;
    db::verify_connection(&pool).await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    // Kernel wiring for the contact aggregate family.
    let repo: Arc<dyn EventRepository> = Arc::new(PgEventRepository::new(pool.clone()));
    let registry = Arc::new(contact::registry()?);
    let users = default_user_factory();

    let store = EventStore::<Contact>::new(
        Arc::clone(&repo),
        Arc::clone(&registry),
        Arc::clone(&users),
        config.cqrs_enabled,
    );
    let handler = Arc::new(CommandHandler::with_options(
        store.clone(),
        config.handler_options(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let stream = Arc::new(InMemoryEventStream::<Contact>::new(
        STREAM_BUFFER,
        shutdown_rx.clone(),
    ));

    let read_model = Arc::new(contact::read_model());
    read_model.attach(stream.as_ref());

    let publisher_handle = config.cqrs_enabled.then(|| {
        OutboxPublisher::new(store.clone(), stream.clone(), config.publisher_options())
            .start(shutdown_rx.clone())
    });

    let admin_app = Arc::new(AdminApp::new(
        Arc::clone(&repo),
        registry,
        users,
        Arc::clone(&handler),
        config.cqrs_enabled,
    ));

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(admin_router(admin_app))
        .merge(contact::contact_router(ContactState {
            handler,
            read_model,
        }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the background loops before closing the pool.
    tracing::info!("Server shutting down...");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = publisher_handle {
        let _ = handle.await;
    }

    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
