//! Ports layer for the Process Runner.
//!
//! - Outbound (Driven) ports: path policy and the streaming line sink

pub mod outbound;

pub use outbound::*;
