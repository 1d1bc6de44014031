//! In-memory event stream
//!
//! Bounded channel drained by a single dispatcher task. Subscribers are
//! invoked serially, in registration order, per event; a panicking
//! subscriber is logged and kept registered, and the other subscribers
//! still receive the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};

use crate::eventsourcing::aggregate::Aggregate;
use crate::eventsourcing::event::EventEnvelope;

use super::{EventStream, StreamError, SubscribeFn};

/// Single-process pub/sub backed by a tokio channel.
pub struct InMemoryEventStream<A: Aggregate> {
    sender: mpsc::Sender<EventEnvelope<A>>,
    subscribers: Arc<RwLock<Vec<SubscribeFn<A>>>>,
}

impl<A: Aggregate> Clone for InMemoryEventStream<A> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<A: Aggregate> InMemoryEventStream<A> {
    /// Spawn the dispatcher and return the stream handle. The dispatcher
    /// runs until `shutdown` fires (dropping the sender counts as firing)
    /// or every handle is dropped.
    pub fn new(buffer: usize, shutdown: watch::Receiver<bool>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer);
        let subscribers: Arc<RwLock<Vec<SubscribeFn<A>>>> = Arc::new(RwLock::new(Vec::new()));

        tokio::spawn(dispatch(receiver, Arc::clone(&subscribers), shutdown));

        Self {
            sender,
            subscribers,
        }
    }
}

async fn dispatch<A: Aggregate>(
    mut receiver: mpsc::Receiver<EventEnvelope<A>>,
    subscribers: Arc<RwLock<Vec<SubscribeFn<A>>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            maybe_event = receiver.recv() => match maybe_event {
                Some(event) => deliver(&subscribers, &event),
                None => return,
            },
            _ = shutdown.changed() => {
                tracing::debug!("event stream dispatcher stopped");
                return;
            }
        }
    }
}

fn deliver<A: Aggregate>(subscribers: &RwLock<Vec<SubscribeFn<A>>>, event: &EventEnvelope<A>) {
    let subscribers = subscribers.read();

    for (position, subscriber) in subscribers.iter().enumerate() {
        let outcome = catch_unwind(AssertUnwindSafe(|| subscriber(event)));
        if outcome.is_err() {
            tracing::error!(
                subscriber = position,
                event_type = event.event_type(),
                aggregate_id = %event.aggregate_id(),
                "subscriber panicked while handling event"
            );
        }
    }
}

#[async_trait]
impl<A: Aggregate> EventStream<A> for InMemoryEventStream<A> {
    async fn publish(&self, events: Vec<EventEnvelope<A>>) -> Result<(), StreamError> {
        for event in events {
            tracing::debug!(event = %event, "publishing event");
            self.sender
                .send(event)
                .await
                .map_err(|_| StreamError::Closed)?;
        }

        Ok(())
    }

    fn subscribe(&self, subscriber: SubscribeFn<A>) {
        self.subscribers.write().push(subscriber);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{Contact, ContactEvent};
    use crate::eventsourcing::user::system_user;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    fn envelope(version: i64) -> EventEnvelope<Contact> {
        EventEnvelope::new(
            ContactEvent::NameSet {
                first_name: "Ada".to_string(),
                last_name: format!("v{version}"),
            },
            Uuid::new_v4(),
            version,
            system_user(),
        )
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn test_delivery_preserves_publish_order() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let stream = InMemoryEventStream::<Contact>::new(8, shutdown_rx);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        stream.subscribe(Box::new(move |event| {
            sink.lock().unwrap().push(event.aggregate_version());
        }));

        stream
            .publish(vec![envelope(1), envelope(2), envelope(3)])
            .await
            .unwrap();

        wait_until(|| received.lock().unwrap().len() == 3).await;
        assert_eq!(*received.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_subscribers_called_in_registration_order() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let stream = InMemoryEventStream::<Contact>::new(8, shutdown_rx);

        let received = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let sink = Arc::clone(&received);
            stream.subscribe(Box::new(move |_| {
                sink.lock().unwrap().push(tag);
            }));
        }

        stream.publish(vec![envelope(1)]).await.unwrap();

        wait_until(|| received.lock().unwrap().len() == 2).await;
        assert_eq!(*received.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let stream = InMemoryEventStream::<Contact>::new(8, shutdown_rx);

        stream.subscribe(Box::new(|_| panic!("boom")));

        let received = Arc::new(Mutex::new(0u32));
        let sink = Arc::clone(&received);
        stream.subscribe(Box::new(move |_| {
            *sink.lock().unwrap() += 1;
        }));

        stream.publish(vec![envelope(1), envelope(2)]).await.unwrap();

        // The second subscriber still receives both events, and the
        // panicking one stays registered without killing the dispatcher.
        wait_until(|| *received.lock().unwrap() == 2).await;
    }
}
