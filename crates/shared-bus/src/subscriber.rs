//! # Subscriber
//!
//! Defines the subscription side of the bus.

use crate::events::{BusMessage, TopicFilter};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// A subscription handle for receiving messages.
///
/// When dropped, the subscription is automatically removed from the bus.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<BusMessage>,

    /// Filter for this subscription.
    filter: TopicFilter,

    /// Cleanup handle for subscription tracking.
    guard: SubscriptionGuard,
}

impl Subscription {
    /// Create a new subscription.
    pub(crate) fn new(
        receiver: broadcast::Receiver<BusMessage>,
        filter: TopicFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        keys: Vec<String>,
    ) -> Self {
        Self {
            receiver,
            filter,
            guard: SubscriptionGuard {
                subscriptions,
                keys,
            },
        }
    }

    /// Receive the next message that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next matching message
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            let message = match self.receiver.recv().await {
                Ok(m) => m,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(
                        lagged = count,
                        topics = ?self.filter.topics,
                        "Subscriber lagged, some messages dropped"
                    );
                    continue;
                }
            };

            if self.filter.matches(&message) {
                return Some(message);
            }
            // Message doesn't match filter, continue waiting
        }
    }

    /// Try to receive the next message without blocking.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - A message was available and matched
    /// - `None` - Nothing buffered, or the channel was closed
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        loop {
            let message = match self.receiver.try_recv() {
                Ok(m) => m,
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&message) {
                return Some(message);
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Remove the subscription from the bus.
    pub fn unsubscribe(self) {
        debug!(topics = ?self.filter.topics, "Unsubscribed");
    }
}

/// Decrements the bus's per-topic subscription counts on drop.
struct SubscriptionGuard {
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    keys: Vec<String>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        for key in &self.keys {
            let Some(count) = subs.get_mut(key) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 {
                subs.remove(key);
            }
        }
        debug!(topics = ?self.keys, "Subscription dropped");
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct MessageStream {
    inner: BroadcastStream<BusMessage>,
    filter: TopicFilter,
    _guard: SubscriptionGuard,
}

impl MessageStream {
    /// Create a new message stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let Subscription {
            receiver,
            filter,
            guard,
        } = subscription;
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
            _guard: guard,
        }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}

impl Stream for MessageStream {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(message))) => {
                    if self.filter.matches(&message) {
                        return Poll::Ready(Some(message));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    warn!(lagged = count, "Stream lagged, some messages dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
