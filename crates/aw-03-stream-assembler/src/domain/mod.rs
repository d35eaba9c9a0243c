//! # Domain Layer - Stream Assembler
//!
//! - `events`: tagged event model and usage normalisation
//! - `assembler`: precedence rules folding events into one result

pub mod assembler;
pub mod events;

pub use assembler::*;
pub use events::*;
