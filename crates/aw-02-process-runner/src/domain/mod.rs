//! # Domain Layer - Process Runner
//!
//! - `config`: how the tool is launched
//! - `output`: invocation and collected output
//! - `workdir`: working directory derivation and project id handling

pub mod config;
pub mod output;
pub mod workdir;

pub use config::*;
pub use output::*;
pub use workdir::*;
