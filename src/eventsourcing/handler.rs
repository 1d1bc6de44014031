//! Command handler
//!
//! The hydrate-apply-append cycle. A command comes in, the targeted
//! aggregate is rebuilt from its event history, the command produces new
//! events, and those are appended with the next contiguous versions. The
//! repository's version guard turns concurrent writers into a
//! `VersionConflict` for everyone but one.

use uuid::Uuid;

use super::aggregate::{Aggregate, AggregateType};
use super::cache::{Cache, CacheOptions};
use super::command::Command;
use super::error::HandlerError;
use super::event::EventEnvelope;
use super::store::EventStore;

/// Command handler construction options.
#[derive(Debug, Clone, Default)]
pub struct HandlerOptions {
    /// How many times a `VersionConflict` append is retried from a fresh
    /// hydrate. 0 surfaces the conflict to the caller.
    pub conflict_retries: u32,

    /// Hydrate cache tuning. Disabled by default.
    pub cache: CacheOptions,
}

/// Handles commands for one aggregate family.
pub struct CommandHandler<A: Aggregate> {
    store: EventStore<A>,
    cache: Cache<Uuid, A>,
    conflict_retries: u32,
}

impl<A: Aggregate> CommandHandler<A> {
    pub fn new(store: EventStore<A>) -> Self {
        Self::with_options(store, HandlerOptions::default())
    }

    pub fn with_options(store: EventStore<A>, options: HandlerOptions) -> Self {
        Self {
            store,
            cache: Cache::new(options.cache),
            conflict_retries: options.conflict_retries,
        }
    }

    /// Run a command through the hydrate-apply-append cycle and return the
    /// aggregate with the new events applied.
    pub async fn handle(&self, command: &dyn Command<A>) -> Result<A, HandlerError> {
        if command.aggregate_type() != A::aggregate_type() {
            return Err(HandlerError::InvalidAggregateType {
                expected: A::aggregate_type(),
                got: command.aggregate_type(),
            });
        }

        let mut attempt = 0;
        loop {
            let result = self.try_handle(command).await;
            match &result {
                Err(err) if err.is_version_conflict() && attempt < self.conflict_retries => {
                    attempt += 1;
                    tracing::warn!(
                        aggregate_id = %command.aggregate_id(),
                        attempt,
                        "version conflict, retrying command from fresh hydrate"
                    );
                    self.cache.remove(&command.aggregate_id());
                }
                _ => return result,
            }
        }
    }

    async fn try_handle(&self, command: &dyn Command<A>) -> Result<A, HandlerError> {
        // A nil command id means a brand new aggregate; otherwise replay
        // whatever history exists (possibly none, for create commands that
        // minted their own id).
        let command_id = command.aggregate_id();
        let mut aggregate = if command_id == Uuid::nil() {
            A::default()
        } else {
            self.hydrate_or_default(command_id).await?
        };

        let current_version = aggregate.aggregate_version();

        let payloads = command
            .apply(&mut aggregate)
            .map_err(|err| HandlerError::from_command(command_id, err))?;

        if payloads.is_empty() {
            return Ok(aggregate);
        }

        let aggregate_id = if command_id != Uuid::nil() {
            command_id
        } else {
            Uuid::new_v4()
        };

        let events: Vec<EventEnvelope<A>> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| {
                EventEnvelope::new(
                    payload,
                    aggregate_id,
                    current_version + i as i64 + 1,
                    command.issued_by(),
                )
            })
            .collect();

        self.store.store(&events).await?;
        self.cache.remove(&aggregate_id);

        self.apply_events(&mut aggregate, &events)?;

        Ok(aggregate)
    }

    /// Rebuild an aggregate from its full event history.
    ///
    /// Returns `AggregateNotFound` when no events exist.
    pub async fn hydrate_aggregate(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: Uuid,
    ) -> Result<A, HandlerError> {
        if *aggregate_type != A::aggregate_type() {
            return Err(HandlerError::InvalidAggregateType {
                expected: A::aggregate_type(),
                got: aggregate_type.clone(),
            });
        }

        if let Some(cached) = self.cache.get(&aggregate_id) {
            return Ok(cached);
        }

        let events = self.store.load(aggregate_type, aggregate_id).await?;
        if events.is_empty() {
            return Err(HandlerError::AggregateNotFound(aggregate_id));
        }

        let mut aggregate = A::default();
        self.apply_events(&mut aggregate, &events)?;

        self.cache.add(aggregate_id, aggregate.clone());

        Ok(aggregate)
    }

    /// Fold an already-loaded event sequence into an aggregate.
    pub fn hydrate_aggregate_from_events(
        &self,
        aggregate_type: &AggregateType,
        events: &[EventEnvelope<A>],
    ) -> Result<A, HandlerError> {
        if *aggregate_type != A::aggregate_type() {
            return Err(HandlerError::InvalidAggregateType {
                expected: A::aggregate_type(),
                got: aggregate_type.clone(),
            });
        }

        let Some(first) = events.first() else {
            return Err(HandlerError::AggregateNotFound(Uuid::nil()));
        };

        let mut aggregate = A::default();
        self.apply_events(&mut aggregate, events)?;

        tracing::debug!(
            aggregate_id = %first.aggregate_id(),
            version = aggregate.aggregate_version(),
            "hydrated aggregate from events"
        );

        Ok(aggregate)
    }

    /// Hydrate for the command path: an empty history yields the default
    /// aggregate so create commands can run their own preconditions.
    async fn hydrate_or_default(&self, aggregate_id: Uuid) -> Result<A, HandlerError> {
        if let Some(cached) = self.cache.get(&aggregate_id) {
            return Ok(cached);
        }

        let events = self.store.load(&A::aggregate_type(), aggregate_id).await?;
        if events.is_empty() {
            return Ok(A::default());
        }

        let mut aggregate = A::default();
        self.apply_events(&mut aggregate, &events)?;

        Ok(aggregate)
    }

    /// Apply events in order, checking that each one continues the version
    /// sequence.
    fn apply_events(
        &self,
        aggregate: &mut A,
        events: &[EventEnvelope<A>],
    ) -> Result<(), HandlerError> {
        for event in events {
            let expected = aggregate.aggregate_version() + 1;
            if event.aggregate_version() != expected {
                return Err(HandlerError::InvalidAggregateVersion {
                    expected,
                    got: event.aggregate_version(),
                });
            }

            aggregate
                .apply(event)
                .map_err(|err| HandlerError::ApplyFailed(Box::new(err)))?;
        }

        Ok(())
    }
}
