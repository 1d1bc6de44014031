//! Outbox publisher
//!
//! Background loop that drains unpublished events from the repository,
//! forwards them to the in-process stream, then marks them published.
//! Marking happens after delivery, so a crash in between re-delivers the
//! batch on the next cycle: at-least-once, never lost.
//!
//! Run one publisher per aggregate type. With several loops on the same
//! outbox, per-subscriber ordering across loops is undefined.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::eventsourcing::aggregate::Aggregate;
use crate::eventsourcing::error::StoreError;
use crate::eventsourcing::store::EventStore;
use crate::stream::{EventStream, StreamError};

/// Sleep between cycles when the outbox was empty.
const IDLE_SLEEP: Duration = Duration::from_secs(1);
/// Sleep between cycles after a non-empty batch.
const BUSY_SLEEP: Duration = Duration::from_millis(10);
/// First backoff step after a failed batch.
const BACKOFF_INITIAL: Duration = Duration::from_millis(500);
/// Backoff stops growing after this many consecutive failures.
const BACKOFF_MAX_RETRIES: u32 = 5;

/// Publisher construction options.
#[derive(Debug, Clone)]
pub struct PublisherOptions {
    /// Maximum number of events drained per cycle.
    pub batch_size: usize,

    /// When false (test mode), every sleep becomes zero-delay.
    pub backoff: bool,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            backoff: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum PublishBatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Drains the outbox of one aggregate type into an event stream.
pub struct OutboxPublisher<A: Aggregate> {
    store: EventStore<A>,
    stream: Arc<dyn EventStream<A>>,
    batch_size: usize,
    backoff: bool,
}

impl<A: Aggregate> OutboxPublisher<A> {
    pub fn new(
        store: EventStore<A>,
        stream: Arc<dyn EventStream<A>>,
        options: PublisherOptions,
    ) -> Self {
        Self {
            store,
            stream,
            batch_size: options.batch_size,
            backoff: options.backoff,
        }
    }

    /// Spawn the loop on the runtime.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run until `shutdown` fires. Cancellation is checked between cycles;
    /// an in-flight batch is never interrupted.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            aggregate_type = %A::aggregate_type(),
            batch_size = self.batch_size,
            "outbox publisher started"
        );

        let mut failures: u32 = 0;

        loop {
            let delay = match self.process_batch().await {
                Ok(0) => {
                    failures = 0;
                    self.sleep_for(IDLE_SLEEP)
                }
                Ok(count) => {
                    failures = 0;
                    tracing::debug!(count, "published outbox batch");
                    self.sleep_for(BUSY_SLEEP)
                }
                Err(err) => {
                    failures = (failures + 1).min(BACKOFF_MAX_RETRIES);
                    tracing::error!(
                        error = %err,
                        failures,
                        "outbox publisher: failed to process batch"
                    );
                    self.sleep_for(backoff_delay(failures))
                }
            };

            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("outbox publisher stopped");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if *shutdown.borrow() {
                tracing::info!("outbox publisher stopped");
                return;
            }
        }
    }

    /// One cycle: drain, deliver, mark. Returns the number of events
    /// published. Any failure leaves the batch unpublished for the next
    /// cycle.
    async fn process_batch(&self) -> Result<usize, PublishBatchError> {
        let events = self.store.load_unpublished(self.batch_size).await?;

        if events.is_empty() {
            return Ok(0);
        }

        self.stream.publish(events.clone()).await?;
        self.store.mark_published(&events).await?;

        Ok(events.len())
    }

    fn sleep_for(&self, delay: Duration) -> Duration {
        if self.backoff {
            delay
        } else {
            Duration::ZERO
        }
    }
}

/// Exponential step: 500ms, 1s, 2s, 4s, 8s, then flat.
fn backoff_delay(failures: u32) -> Duration {
    BACKOFF_INITIAL * 2u32.saturating_pow(failures.saturating_sub(1))
}
