//! Coordinator error type.

use flotilla_engine::EngineError;
use flotilla_store::StoreError;
use flotilla_writer::WriterError;

use crate::client::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("writer: {0}")]
    Writer(#[from] WriterError),

    #[error("client: {0}")]
    Client(#[from] ClientError),

    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}
