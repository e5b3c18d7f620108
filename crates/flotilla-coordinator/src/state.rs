//! Process-lifetime secrets shared between push and pull paths.
//!
//! A node's pulled config must use the same shared password the manager
//! last pushed, so both paths read from this one place. The shared
//! password is drawn once per process start and is read-only afterwards;
//! construction fails closed if the entropy source is unavailable.

use std::sync::Arc;

use parking_lot::Mutex;
use time::OffsetDateTime;

use flotilla_core::util::key32;
use flotilla_core::KeyError;
use flotilla_engine::EngineConfig;

pub struct SecretsState {
    shared_password: String,
    updated_at: Mutex<OffsetDateTime>,
    local: Mutex<Option<Arc<EngineConfig>>>,
}

impl SecretsState {
    pub fn new() -> Result<Self, KeyError> {
        Ok(Self {
            shared_password: key32()?,
            updated_at: Mutex::new(OffsetDateTime::now_utc()),
            local: Mutex::new(None),
        })
    }

    /// Password on every node's `remote` inbound; lets the manager
    /// regenerate node configs without rotating client credentials.
    pub fn shared_password(&self) -> &str {
        &self.shared_password
    }

    /// When the local config was last rebuilt.
    pub fn updated_at(&self) -> OffsetDateTime {
        *self.updated_at.lock()
    }

    /// The last-built local config; the writer derives node mirrors from it.
    pub fn local_config(&self) -> Option<Arc<EngineConfig>> {
        self.local.lock().clone()
    }

    /// Record a fresh local build. Written by the coordinator only.
    pub fn record_local_build(&self, config: Arc<EngineConfig>) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        *self.updated_at.lock() = now;
        *self.local.lock() = Some(config);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_password_is_stable_per_process() {
        let state = SecretsState::new().unwrap();
        assert_eq!(state.shared_password(), state.shared_password());
        assert!(!state.shared_password().is_empty());

        let other = SecretsState::new().unwrap();
        assert_ne!(state.shared_password(), other.shared_password());
    }

    #[test]
    fn record_local_build_advances_updated_at() {
        let state = SecretsState::new().unwrap();
        let before = state.updated_at();
        assert!(state.local_config().is_none());

        let at = state.record_local_build(Arc::new(EngineConfig::new("warning")));
        assert!(at >= before);
        assert_eq!(state.updated_at(), at);
        assert!(state.local_config().is_some());
    }
}
