//! # Domain Layer - Concurrency Gate
//!
//! - `circuit`: consecutive-failure circuit breaker
//! - `config`: limits
//! - `metrics`: running counters behind `EngineMetrics`

pub mod circuit;
pub mod config;
pub mod metrics;

pub use circuit::*;
pub use config::*;
pub use metrics::*;
