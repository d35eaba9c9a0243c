//! # Bus Messages
//!
//! A message is a topic name plus a JSON payload. Typed envelopes live in
//! `shared-types`; the bus only moves text.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::ExecutionError;
use thiserror::Error;

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus was shut down.
    #[error("Message bus closed")]
    Closed,

    /// A payload could not be encoded.
    #[error("Failed to encode payload for {topic}: {reason}")]
    Encode { topic: String, reason: String },

    /// A payload could not be decoded.
    #[error("Failed to decode payload from {topic}: {reason}")]
    Decode { topic: String, reason: String },
}

impl From<BusError> for ExecutionError {
    fn from(err: BusError) -> Self {
        ExecutionError::Bus(err.to_string())
    }
}

/// One message on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// JSON payload.
    pub payload: String,
}

impl BusMessage {
    /// Create a message.
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Encode a value as the payload of a new message.
    pub fn encode<T: Serialize + ?Sized>(topic: &str, value: &T) -> Result<Self, BusError> {
        let payload = serde_json::to_string(value).map_err(|e| BusError::Encode {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(topic, payload))
    }

    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        serde_json::from_str(&self.payload).map_err(|e| BusError::Decode {
            topic: self.topic.clone(),
            reason: e.to_string(),
        })
    }
}

/// Selects which topics a subscription receives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    /// Exact topic names. Empty means all topics.
    pub topics: Vec<String>,
}

impl TopicFilter {
    /// Receive every topic.
    #[must_use]
    pub fn all() -> Self {
        Self { topics: Vec::new() }
    }

    /// Receive a single topic.
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topics: vec![topic.into()],
        }
    }

    /// Receive any of the listed topics.
    #[must_use]
    pub fn topics(topics: Vec<String>) -> Self {
        Self { topics }
    }

    /// Whether a message passes this filter.
    #[must_use]
    pub fn matches(&self, message: &BusMessage) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| *t == message.topic)
    }
}
