//! # Time-Bounded Delivery Cache
//!
//! Drops redeliveries of the same message on an at-least-once bus.
//!
//! - Ids are remembered for a fixed window after first delivery
//! - Expired ids are garbage-collected lazily, at most once per interval
//! - Memory is bounded by the number of distinct ids seen per window

use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// A message id was delivered more than once within the window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Message {id} was already delivered")]
pub struct DuplicateDelivery {
    /// The repeated id.
    pub id: Uuid,
}

/// Time-bounded cache of delivered message ids.
pub struct DeliveryCache {
    /// Map of id -> instant it was first seen.
    seen: HashMap<Uuid, Instant>,

    /// How long an id is remembered.
    window: Duration,

    /// Last garbage collection.
    last_gc: Instant,

    /// Garbage collection interval.
    gc_interval: Duration,
}

impl DeliveryCache {
    /// Default retention window.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(60);

    /// Create a cache with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_WINDOW, Self::DEFAULT_GC_INTERVAL)
    }

    /// Create a cache with custom settings.
    #[must_use]
    pub fn with_config(window: Duration, gc_interval: Duration) -> Self {
        Self {
            seen: HashMap::new(),
            window,
            last_gc: Instant::now(),
            gc_interval,
        }
    }

    /// Record a delivery, rejecting ids already seen within the window.
    ///
    /// # Errors
    ///
    /// `DuplicateDelivery` if `id` was recorded less than `window` ago.
    pub fn check_and_insert(&mut self, id: Uuid) -> Result<(), DuplicateDelivery> {
        let now = Instant::now();

        if now.duration_since(self.last_gc) > self.gc_interval {
            self.garbage_collect(now);
            self.last_gc = now;
        }

        if let Some(first_seen) = self.seen.get(&id) {
            if now.duration_since(*first_seen) < self.window {
                return Err(DuplicateDelivery { id });
            }
        }

        self.seen.insert(id, now);
        Ok(())
    }

    /// Check if an id is remembered without recording it.
    #[must_use]
    pub fn contains(&self, id: &Uuid) -> bool {
        self.seen.contains_key(id)
    }

    /// Get the number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Remove expired ids.
    fn garbage_collect(&mut self, now: Instant) {
        let window = self.window;
        self.seen
            .retain(|_, first_seen| now.duration_since(*first_seen) < window);
    }
}

impl Default for DeliveryCache {
    fn default() -> Self {
        Self::new()
    }
}
