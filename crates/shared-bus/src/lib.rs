//! # Shared Bus - Topic Message Bus
//!
//! Callers and the dispatcher never call each other directly; every request,
//! stream chunk and response travels over this bus.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │    Caller    │  publish(request)  │  Dispatcher  │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!        ↑               ▼                    ↑  │
//!        │         ┌──────────────┐  subscribe│  │ publish(response)
//!        └──────── │  Message Bus │ ──────────┘  │
//!       subscribe  │              │ ←────────────┘
//!                  └──────────────┘
//! ```
//!
//! ## Delivery
//!
//! - **Subscribe before publish:** a subscription only sees messages published
//!   after it was created.
//! - **At-least-once tolerant:** consumers that must act once per message use
//!   `DeliveryCache` to drop redeliveries.
//! - **Unsubscribe on drop:** dropping a `Subscription` removes it.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dedup_cache;
pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use dedup_cache::{DeliveryCache, DuplicateDelivery};
pub use events::{BusError, BusMessage, TopicFilter};
pub use publisher::{InMemoryMessageBus, MessageBus, MessageBusExt};
pub use subscriber::{MessageStream, Subscription};

/// Maximum messages to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
