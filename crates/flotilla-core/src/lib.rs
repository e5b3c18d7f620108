//! # flotilla-core
//!
//! Shared constants and small helpers used across the flotilla workspace:
//! byte/GB math, saturating counter arithmetic, key generation, and local
//! port probing.

pub mod defaults;
pub mod util;

pub use util::KeyError;

/// Crate version, stamped into the CLI banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
