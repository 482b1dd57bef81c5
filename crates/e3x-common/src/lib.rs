//! Shared utilities for e3x: identity files, logging, error types.
//!
//! This crate provides common infrastructure used by the e3x tools.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;

pub use config::{IdentityFile, KeyPairText};
pub use error::{Error, Result};

/// Initialize tracing with a specific default level.
///
/// `RUST_LOG` still takes precedence when set. Safe to call more than once;
/// later calls leave the first subscriber in place.
pub fn init_tracing_with_default(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
