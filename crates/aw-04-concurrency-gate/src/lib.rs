//! # Concurrency Gate Subsystem
//!
//! **Subsystem ID:** 4
//!
//! The single bounded resource of the engine is the number of live child
//! processes. This gate owns it.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Active executions never exceed `max_concurrency` | `Semaphore` permits |
//! | Waiters are admitted in arrival order | `tokio::sync::Semaphore` is fair |
//! | An open circuit rejects without queueing or taking a slot | `CircuitBreaker::check` before acquire |
//! | The circuit opens after exactly N consecutive failures | `CircuitBreaker::record_failure` |
//! | Cooldown elapsed closes the circuit and resets the streak | `CircuitBreaker::check` |
//!
//! ## Metrics
//!
//! Every admission attempt counts toward `total_requests`; circuit rejections
//! count as failures but not toward the average duration.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod service;

pub use domain::*;
pub use service::ConcurrencyGate;
