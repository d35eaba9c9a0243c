//! # Shared Types Crate
//!
//! This crate contains every type that crosses the message bus between
//! callers and the dispatcher, plus the error taxonomy shared by all engine
//! components.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Envelopes and topic names are defined here only.
//! - **Correlation**: Every message carries the request's correlation id; the
//!   private response and stream topics are derived from it.
//! - **Structured failure**: Every failure kind maps to one `ExecutionError`
//!   variant, which renders into the failed response's `error` text.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod ipc;

pub use entities::*;
pub use envelope::{ExecutionRequest, ExecutionResponse, StreamChunkEvent, StreamChunkKind};
pub use errors::*;
pub use ipc::*;
