//! Cross-crate integration tests.

#[cfg(test)]
mod support;

#[cfg(test)]
mod execution;
#[cfg(test)]
mod resilience;
#[cfg(test)]
mod streaming;
