//! Configuration type definitions for the manager process.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub manager: ManagerSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub http: HttpSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Control-plane listener and store locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerSection {
    /// Address the control-plane HTTP server binds.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Path of the fleet-state snapshot file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Directory receiving rotating snapshot backups.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
}

/// Local proxy engine process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Engine executable.
    #[serde(default = "default_engine_binary")]
    pub binary: PathBuf,
    /// Directory the rendered engine config is written into.
    #[serde(default = "default_engine_run_dir")]
    pub run_dir: PathBuf,
    /// Log level handed to the engine config.
    #[serde(default = "default_engine_log_level")]
    pub log_level: String,
}

/// Push/pull HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Tracing filter (e.g. `info`, `flotilla=debug`).
    #[serde(default)]
    pub level: Option<String>,
}

impl Default for ManagerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            database_path: default_database_path(),
            backup_dir: default_backup_dir(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            binary: default_engine_binary(),
            run_dir: default_engine_run_dir(),
            log_level: default_engine_log_level(),
        }
    }
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ManagerConfig = toml::from_str("").unwrap();
        assert_eq!(config.manager.listen, "127.0.0.1:8090");
        assert_eq!(
            config.manager.database_path.to_str().unwrap(),
            "storage/database.json"
        );
        assert_eq!(config.http.timeout_secs, 10);
        assert!(config.logging.level.is_none());
    }

    #[test]
    fn full_config_deserializes() {
        let toml_str = r#"
[manager]
listen = "0.0.0.0:9000"
database_path = "/var/lib/flotilla/database.json"
backup_dir = "/var/lib/flotilla/backups"

[engine]
binary = "/usr/local/bin/xray"
run_dir = "/run/flotilla"
log_level = "info"

[http]
timeout_secs = 5

[logging]
level = "debug"
"#;
        let config: ManagerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.manager.listen, "0.0.0.0:9000");
        assert_eq!(config.engine.binary.to_str().unwrap(), "/usr/local/bin/xray");
        assert_eq!(config.engine.log_level, "info");
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }
}
