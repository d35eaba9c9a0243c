//! # Dispatcher Subsystem
//!
//! **Subsystem ID:** 5
//!
//! Connects the bus to the engine. The [`Dispatcher`] is the only consumer of
//! the shared request topic; the [`ExecutionClient`] is what callers use to
//! talk to it.
//!
//! ## Architecture
//!
//! ```text
//!  ExecutionClient                          Dispatcher
//!  ───────────────                          ──────────
//!  subscribe(response, stream)
//!  publish ── executions.requests ────────→ decode, dedup, spawn
//!                                              │
//!                                              ▼
//!                                           ExecutionEngine
//!                                             gate → runner → assemble
//!                                              │
//!  on_chunk ←─ executions.stream.<id> ──────── ResponsePublisher
//!  return   ←─ executions.response.<id> ─────┘
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement |
//! |-----------|-------------|
//! | Exactly one response per accepted request | `Dispatcher::process` publishes once, whatever the outcome |
//! | Requests cut off by shutdown are still answered | Drain claims unanswered ids and publishes `timeout` failures |
//! | Redelivered request ids are not executed twice | `DeliveryCache` keyed on request id |
//! | Every chunk precedes the end/error marker, which precedes the response | Runner drains its line sink before returning |
//! | The client never misses its response | Subscribes before publishing |

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod dispatcher;
pub mod engine;
pub mod publisher;

#[cfg(test)]
mod test_support;

pub use client::{ExecutionClient, DEFAULT_REQUEST_TIMEOUT};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use engine::{ExecutionEngine, HEALTH_MARKER, HEALTH_PROMPT};
pub use publisher::ResponsePublisher;
