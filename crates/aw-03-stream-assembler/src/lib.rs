//! # Stream Assembler Subsystem
//!
//! **Subsystem ID:** 3
//!
//! Reconstructs one logical result (text, session id, usage) from the
//! heterogeneous line-oriented JSON event stream the tool writes.
//!
//! ## Tolerance
//!
//! - Lines that are not JSON are skipped one by one, never fatal.
//! - Event shapes that are not recognised are skipped.
//! - Only a complete absence of usable content fails, with
//!   `ExecutionError::Parse`.
//!
//! ```text
//! lines ──→ parse ──→ StreamEvent::classify ──→ ResultAssembler ──→ AssembledResult
//!                └──→ UsageReport (every value) ──┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;

pub use domain::*;
