//! # Process Runner Subsystem
//!
//! **Subsystem ID:** 2
//!
//! Runs the external command-line tool once per request: resolves and guards
//! the working directory, spawns the child, writes the prompt to its standard
//! input, and collects its output either buffered or line by line.
//!
//! ## Failure Kinds
//!
//! | Error | When |
//! |-------|------|
//! | `Validation` | working directory refused by the `PathGuard` |
//! | `Spawn` | the program could not be started |
//! | `Io` | writing the prompt or reading output failed |
//! | `ProcessExit` | non-zero exit; carries the captured error stream |
//! | `EmptyOutput` | clean exit with zero bytes of output |
//! | `Timeout` | wall-clock limit from spawn exceeded; the child is killed |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service.rs        - ProcessRunner (spawn, feed, collect)       │
//! │  adapters/         - SafeRootGuard                              │
//! │  ports/outbound.rs - PathGuard, LineSink                        │
//! │  domain/           - RunnerConfig, Invocation, workdir rules    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::SafeRootGuard;
pub use domain::*;
pub use ports::*;
pub use service::ProcessRunner;
