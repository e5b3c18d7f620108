//! Fleet state store.
//!
//! The whole fleet state (settings, stats, users, nodes) is one JSON
//! document guarded by a single process-wide mutex. Every read-modify-write
//! sequence holds the lock across the sequence; `save` is called by the
//! holder with the guard still live.

mod node;
mod settings;
mod stats;
mod store;
mod user;

pub use node::{Node, NodeStatus, Protocol, RealitySettings, Security, TlsSettings, Transport};
pub use settings::{EncryptionOptions, ResetPolicy, Settings};
pub use stats::Stats;
pub use store::{Content, Store, StoreError};
pub use user::User;
