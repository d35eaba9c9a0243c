//! # Message Publisher
//!
//! Defines the bus port and its in-memory implementation.

use crate::events::{BusError, BusMessage, TopicFilter};
use crate::subscriber::{MessageStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Key used to track subscriptions that receive every topic.
pub(crate) const WILDCARD_KEY: &str = "*";

/// Port for publishing to and subscribing on the bus.
///
/// Callers and the dispatcher hold an `Arc<dyn MessageBus>`; a networked
/// broker would implement this same trait.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a message.
    ///
    /// # Returns
    ///
    /// The number of subscribers the message was delivered to. Zero is not an
    /// error: a caller that timed out has already unsubscribed.
    async fn publish(&self, message: BusMessage) -> Result<usize, BusError>;

    /// Subscribe to messages matching a filter.
    fn subscribe(&self, filter: TopicFilter) -> Subscription;

    /// Total number of publish attempts.
    fn messages_published(&self) -> u64;
}

/// Typed helpers over any `MessageBus`.
#[async_trait]
pub trait MessageBusExt: MessageBus {
    /// Serialize `value` as JSON and publish it on `topic`.
    async fn publish_json<T>(&self, topic: &str, value: &T) -> Result<usize, BusError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let message = BusMessage::encode(topic, value)?;
        self.publish(message).await
    }

    /// Subscribe to exactly one topic.
    fn subscribe_topic(&self, topic: &str) -> Subscription {
        self.subscribe(TopicFilter::topic(topic))
    }
}

impl<B: MessageBus + ?Sized> MessageBusExt for B {}

/// In-memory implementation of the bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer
/// semantics. Each subscriber buffers up to `capacity` messages; a subscriber
/// that falls further behind loses the oldest ones.
pub struct InMemoryMessageBus {
    /// Broadcast sender for messages.
    sender: broadcast::Sender<BusMessage>,

    /// Active subscription count by topic.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Set once the bus is closed.
    closed: AtomicBool,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            messages_published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            capacity: capacity.max(1),
        }
    }

    /// Get a stream of messages matching a filter.
    #[must_use]
    pub fn message_stream(&self, filter: TopicFilter) -> MessageStream {
        MessageStream::new(self.subscribe(filter))
    }

    /// Get the number of live subscriptions across all topics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the number of live subscriptions that name `topic` explicitly.
    #[must_use]
    pub fn topic_subscribers(&self, topic: &str) -> usize {
        self.subscriptions
            .read()
            .map(|subs| subs.get(topic).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Refuse all further publishes.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        debug!("Message bus closed");
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, message: BusMessage) -> Result<usize, BusError> {
        // Always increment counter (publish was attempted)
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        if self.is_closed() {
            warn!(topic = %message.topic, "Publish refused, bus closed");
            return Err(BusError::Closed);
        }

        let topic = message.topic.clone();
        match self.sender.send(message) {
            Ok(receiver_count) => {
                debug!(topic = %topic, receivers = receiver_count, "Message published");
                Ok(receiver_count)
            }
            Err(_) => {
                // No receivers - message is dropped
                debug!(topic = %topic, "Message dropped (no receivers)");
                Ok(0)
            }
        }
    }

    fn subscribe(&self, filter: TopicFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let keys: Vec<String> = if filter.topics.is_empty() {
            vec![WILDCARD_KEY.to_string()]
        } else {
            filter.topics.clone()
        };

        if let Ok(mut subs) = self.subscriptions.write() {
            for key in &keys {
                *subs.entry(key.clone()).or_insert(0) += 1;
            }
        }

        debug!(topics = ?filter.topics, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), keys)
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}
