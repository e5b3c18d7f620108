//! Proxy engine configuration model and adapter.
//!
//! The engine itself is an external process; this crate owns the typed
//! configuration document the control plane renders for it, the counter
//! name grammar its stats endpoint speaks, and the thin adapter contract
//! the coordinator drives (set config, restart, query counters).

mod adapter;
mod config;
mod error;
mod stats;

pub use adapter::{Engine, ProcessEngine};
pub use config::{
    Balancer, Client, EngineConfig, Inbound, InboundSettings, Metadata, Outbound,
    OutboundSettings, Reverse, ReverseItem, Rule, ServerEndpoint, API_TAG, OUT_TAG,
};
pub use error::EngineError;
pub use stats::StatEntry;
