//! Default value functions for serde deserialization.
//!
//! Shared constants come from `flotilla_core::defaults`.

use std::path::PathBuf;

use flotilla_core::defaults;

pub(crate) fn default_listen() -> String {
    "127.0.0.1:8090".to_string()
}

pub(crate) fn default_database_path() -> PathBuf {
    PathBuf::from("storage/database.json")
}

pub(crate) fn default_backup_dir() -> PathBuf {
    PathBuf::from("storage/backups")
}

pub(crate) fn default_engine_binary() -> PathBuf {
    PathBuf::from("xray")
}

pub(crate) fn default_engine_run_dir() -> PathBuf {
    PathBuf::from("storage/engine")
}

pub(crate) fn default_engine_log_level() -> String {
    "warning".to_string()
}

pub(crate) fn default_http_timeout_secs() -> u64 {
    defaults::HTTP_TIMEOUT_SECS
}
