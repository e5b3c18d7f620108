//! Fleet coordinator.
//!
//! Owns the periodic workers, the per-node push/pull state machine, usage
//! reconciliation, and quota enforcement. All fleet-state mutation happens
//! under the store's lock; push work is computed from snapshots outside it.

mod client;
mod coordinator;
mod error;
mod reconcile;
mod state;
pub mod worker;

pub use client::{ClientError, HttpClient};
pub use coordinator::Coordinator;
pub use error::SyncError;
pub use state::SecretsState;
