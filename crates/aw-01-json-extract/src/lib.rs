//! # JSON Extraction
//!
//! **Subsystem ID:** 1
//!
//! Pulls a JSON array or object out of free-form text, such as a model reply
//! that wraps its structured answer in prose or in a Markdown code fence.
//!
//! ## Components
//!
//! - `brackets`: balanced-bracket scan that skips bracket characters inside
//!   double-quoted strings (honouring backslash escapes)
//! - `fenced`: interior of a ```` ```json ```` fenced block, and the
//!   "effective output" rule the result assembler applies
//!
//! ## Why not first-open to last-close
//!
//! ```text
//! prefix[1,2,"a]b"]suffix
//!       ^      ^  ^
//!       open   |  real close
//!              bracket inside a string literal
//! ```
//!
//! A naive scan stops at the quoted `]`; this one does not.

pub mod brackets;
pub mod fenced;

pub use brackets::{extract_array, extract_balanced, extract_object, parse_embedded};
pub use fenced::{effective_output, extract_fenced_json};
