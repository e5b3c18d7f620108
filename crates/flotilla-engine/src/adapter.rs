//! Engine adapter: the contract the coordinator drives, plus the
//! process-backed implementation supervising the local engine binary.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, API_TAG};
use crate::error::EngineError;
use crate::stats::StatEntry;

const CONFIG_FILENAME: &str = "engine.json";
const READY_ATTEMPTS: u32 = 50;
const READY_POLL: Duration = Duration::from_millis(100);

/// Thin contract over the local proxy engine.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Stage a config; it takes effect on the next [`Engine::restart`].
    fn set_config(&self, config: EngineConfig);

    /// Current staged config, if any.
    fn config(&self) -> Option<EngineConfig>;

    /// (Re)start the engine with the staged config, blocking until it
    /// reports ready.
    async fn restart(&self) -> Result<(), EngineError>;

    /// Cumulative byte counters since the engine's last reset.
    async fn query_stats(&self) -> Result<Vec<StatEntry>, EngineError>;
}

/// Supervises the engine as a child process: writes the staged config to
/// the run directory, restarts the binary, and reads counters from the
/// engine's local stats api.
pub struct ProcessEngine {
    binary: PathBuf,
    run_dir: PathBuf,
    current: Mutex<Option<EngineConfig>>,
    child: tokio::sync::Mutex<Option<Child>>,
    http: reqwest::Client,
}

impl ProcessEngine {
    pub fn new(binary: PathBuf, run_dir: PathBuf) -> Self {
        Self {
            binary,
            run_dir,
            current: Mutex::new(None),
            child: tokio::sync::Mutex::new(None),
            http: reqwest::Client::new(),
        }
    }

    fn api_port(&self) -> Result<u16, EngineError> {
        let current = self.current.lock();
        let config = current.as_ref().ok_or(EngineError::NoConfig)?;
        config
            .find_inbound(API_TAG)
            .map(|i| i.port)
            .ok_or_else(|| EngineError::NotReady("config has no api inbound".into()))
    }

    async fn write_config(&self, config: &EngineConfig) -> Result<PathBuf, EngineError> {
        tokio::fs::create_dir_all(&self.run_dir).await?;
        let target = self.run_dir.join(CONFIG_FILENAME);
        let tmp = self.run_dir.join(format!("{CONFIG_FILENAME}.tmp"));
        let data = serde_json::to_vec_pretty(config)?;
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(target)
    }

    async fn wait_ready(&self, port: u16) -> Result<(), EngineError> {
        for _ in 0..READY_ATTEMPTS {
            if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL).await;
        }
        Err(EngineError::NotReady(format!(
            "api port {port} did not come up"
        )))
    }
}

#[async_trait]
impl Engine for ProcessEngine {
    fn set_config(&self, config: EngineConfig) {
        *self.current.lock() = Some(config);
    }

    fn config(&self) -> Option<EngineConfig> {
        self.current.lock().clone()
    }

    async fn restart(&self) -> Result<(), EngineError> {
        let config = self.config().ok_or(EngineError::NoConfig)?;
        let path = self.write_config(&config).await?;

        let mut child_slot = self.child.lock().await;
        if let Some(mut old) = child_slot.take() {
            debug!("stopping engine process");
            if let Err(e) = old.start_kill() {
                warn!(error = %e, "failed to signal engine process");
            }
            let _ = old.wait().await;
        }

        let child = Command::new(&self.binary)
            .arg("run")
            .arg("-c")
            .arg(&path)
            .kill_on_drop(true)
            .spawn()?;
        *child_slot = Some(child);
        drop(child_slot);

        let port = self.api_port()?;
        self.wait_ready(port).await?;
        info!(config = %path.display(), "engine restarted");
        Ok(())
    }

    async fn query_stats(&self) -> Result<Vec<StatEntry>, EngineError> {
        let port = self.api_port()?;
        let url = format!("http://127.0.0.1:{port}/v1/stats");
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_config_is_readable_back() {
        let engine = ProcessEngine::new("engine".into(), std::env::temp_dir());
        assert!(engine.config().is_none());
        engine.set_config(EngineConfig::new("warning"));
        assert_eq!(engine.config().unwrap().log.loglevel, "warning");
    }

    #[tokio::test]
    async fn restart_without_config_fails() {
        let engine = ProcessEngine::new("engine".into(), std::env::temp_dir());
        assert!(matches!(engine.restart().await, Err(EngineError::NoConfig)));
    }

    #[tokio::test]
    async fn writes_config_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ProcessEngine::new("engine".into(), dir.path().to_path_buf());
        let path = engine
            .write_config(&EngineConfig::new("warning"))
            .await
            .unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("engine.json.tmp").exists());
        let data = std::fs::read_to_string(&path).unwrap();
        let back: EngineConfig = serde_json::from_str(&data).unwrap();
        assert_eq!(back.log.loglevel, "warning");
    }
}
