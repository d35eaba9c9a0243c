//! # Agent-Worker Test Suite
//!
//! Unified test crate for behaviour that spans crates.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs      # Worker built around a `sh -c` fake tool
//!     ├── execution.rs    # Request → response over the bus
//!     ├── streaming.rs    # Chunk / marker / response ordering
//!     └── resilience.rs   # Circuit breaker, timeouts, dedup, shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p aw-tests
//! cargo test -p aw-tests integration::streaming
//! ```

pub mod integration;
