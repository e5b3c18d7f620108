//! Config writer: renders the fleet state into the local engine config and
//! the per-node mirror configs.
//!
//! Both renderers are pure over their inputs; the only environmental input
//! (free local ports) comes through the injected [`PortAllocator`]. The
//! mirror reads the previously-built local config explicitly — the writer
//! never inspects live engine state.

mod ports;
mod writer;

pub use ports::{FixedPorts, OsPorts, PortAllocator};
pub use writer::{Writer, WriterError};
