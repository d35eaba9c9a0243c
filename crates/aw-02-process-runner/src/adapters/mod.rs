//! Adapters layer for the Process Runner.

pub mod safe_root;

pub use safe_root::SafeRootGuard;
