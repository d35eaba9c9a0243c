//! # Topic Naming
//!
//! One shared request topic, plus one private response topic and one private
//! stream topic per correlation id.
//!
//! | Topic | Publisher | Subscriber |
//! |-------|-----------|------------|
//! | `executions.requests` | any caller | dispatcher (singleton) |
//! | `executions.response.<id>` | dispatcher | the caller that issued `<id>` |
//! | `executions.stream.<id>` | dispatcher | the caller that issued `<id>` |

use uuid::Uuid;

/// Shared topic all requests are published on.
pub const REQUEST_TOPIC: &str = "executions.requests";

/// Prefix of the private response topics.
pub const RESPONSE_TOPIC_PREFIX: &str = "executions.response.";

/// Prefix of the private stream topics.
pub const STREAM_TOPIC_PREFIX: &str = "executions.stream.";

/// Private response topic for a correlation id.
#[must_use]
pub fn response_topic(id: &Uuid) -> String {
    format!("{RESPONSE_TOPIC_PREFIX}{id}")
}

/// Private stream topic for a correlation id.
#[must_use]
pub fn stream_topic(id: &Uuid) -> String {
    format!("{STREAM_TOPIC_PREFIX}{id}")
}
