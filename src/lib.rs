//! eventloom
//!
//! Aggregate-typed event sourcing kernel with a transactional outbox and
//! in-process fan-out. Domain state is an ordered stream of immutable
//! events per aggregate; appends commit atomically with outbox rows, a
//! background publisher re-delivers them to in-process subscribers, and
//! aggregates are rebuilt on demand by replaying their history.

pub mod admin;
pub mod config;
pub mod contact;
pub mod db;
pub mod error;
pub mod eventsourcing;
pub mod publisher;
pub mod readmodel;
pub mod repository;
pub mod stream;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use eventsourcing::{
    Aggregate, AggregateType, Command, CommandBase, CommandHandler, EventEnvelope, EventPayload,
    EventQuery, EventRegistry, EventStore, HandlerOptions,
};
pub use publisher::{OutboxPublisher, PublisherOptions};
pub use repository::{EventRecord, EventRepository, InMemoryEventRepository, PgEventRepository};
pub use stream::{EventStream, InMemoryEventStream};
