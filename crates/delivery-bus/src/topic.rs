//! Keyed broadcast topics and the subscription stream handed to callers.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// Builds the item delivered to a subscriber that fell behind, if any.
pub(crate) type LagMarker<T> = fn(&str) -> Option<T>;

/// A family of broadcast channels keyed by conversation or user id.
///
/// Channels are created on first subscribe and removed once their last
/// subscriber goes away. Publishing to a key nobody listens on is a no-op.
pub(crate) struct TopicMap<T> {
    name: &'static str,
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<T>>>,
}

impl<T: Clone + Send + 'static> TopicMap<T> {
    pub(crate) fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<T>>> {
        self.topics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver `item` to every current subscriber of `key`.
    ///
    /// Returns the number of subscribers reached.
    pub(crate) fn publish(&self, key: &str, item: T) -> usize {
        let sender = match self.lock().get(key) {
            Some(sender) => sender.clone(),
            None => return 0,
        };
        sender.send(item).unwrap_or(0)
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        key: &str,
        on_lag: LagMarker<T>,
    ) -> Subscription<T> {
        let receiver = {
            let mut topics = self.lock();
            topics
                .entry(key.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        debug!(topic = self.name, key = %key, "Subscribed");

        Subscription {
            key: key.to_string(),
            stream: Some(BroadcastStream::new(receiver)),
            topics: Arc::clone(self),
            on_lag,
        }
    }

    /// Drop the channel for `key` if nobody is subscribed any more.
    fn prune(&self, key: &str) {
        let mut topics = self.lock();
        if let Some(sender) = topics.get(key) {
            if sender.receiver_count() == 0 {
                topics.remove(key);
                debug!(topic = self.name, key = %key, "Topic removed");
            }
        }
    }

    pub(crate) fn subscriber_count(&self, key: &str) -> usize {
        self.lock().get(key).map_or(0, |s| s.receiver_count())
    }

    pub(crate) fn topic_count(&self) -> usize {
        self.lock().len()
    }

    /// Drop every channel, ending all open subscriptions.
    pub(crate) fn clear(&self) {
        self.lock().clear();
    }
}

/// A live subscription to one topic.
///
/// Yields items in publish order. Ends when the bus is closed. Dropping it
/// unsubscribes; once the last subscriber of a topic is gone the topic itself
/// is released.
pub struct Subscription<T: Clone + Send + 'static> {
    key: String,
    stream: Option<BroadcastStream<T>>,
    topics: Arc<TopicMap<T>>,
    on_lag: LagMarker<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// The conversation or user id this subscription listens on.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Tear the subscription down explicitly.
    pub fn unsubscribe(self) {
        debug!(topic = self.topics.name, key = %self.key, "Unsubscribed");
    }
}

impl<T: Clone + Send + 'static> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = &mut *self;
        loop {
            let Some(stream) = this.stream.as_mut() else {
                return Poll::Ready(None);
            };

            match Pin::new(stream).poll_next(cx) {
                Poll::Ready(Some(Ok(item))) => return Poll::Ready(Some(item)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(
                        topic = this.topics.name,
                        key = %this.key,
                        skipped,
                        "Subscriber lagged"
                    );
                    match (this.on_lag)(&this.key) {
                        Some(marker) => return Poll::Ready(Some(marker)),
                        None => continue,
                    }
                }
                Poll::Ready(None) => {
                    this.stream = None;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T: Clone + Send + 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        // Release the receiver before checking the count.
        drop(self.stream.take());
        self.topics.prune(&self.key);
    }
}
