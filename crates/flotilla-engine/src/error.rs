//! Engine adapter error types.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no config set")]
    NoConfig,

    #[error("engine not ready: {0}")]
    NotReady(String),
}
