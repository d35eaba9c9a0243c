//! # Worker Runtime Library
//!
//! Configuration and wiring for the agent worker. The binary in `main.rs`
//! is a thin shell around [`WorkerRuntime`]; tests and embedders use this
//! library directly.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod runtime;

pub use config::{BusConfig, ClientConfig, ConfigError, WorkerConfig};
pub use runtime::WorkerRuntime;
