//! Manager process configuration.
//!
//! This is the static config the manager binary reads at startup — listen
//! address, store paths, engine process settings. Everything about the fleet
//! itself (users, nodes, settings) lives in the store, not here.

mod defaults;
mod loader;
mod types;
mod validate;

pub use loader::{load_config, ConfigError};
pub use types::{EngineSection, HttpSection, LoggingSection, ManagerConfig, ManagerSection};
pub use validate::validate_config;
