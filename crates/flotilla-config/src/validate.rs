//! Configuration validation logic.

use std::net::SocketAddr;

use crate::loader::ConfigError;
use crate::ManagerConfig;

pub fn validate_config(config: &ManagerConfig) -> Result<(), ConfigError> {
    if config.manager.listen.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "manager.listen is not a socket address: {}",
            config.manager.listen
        )));
    }
    if config.manager.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "manager.database_path is empty".into(),
        ));
    }
    if config.manager.backup_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("manager.backup_dir is empty".into()));
    }
    if config.engine.binary.as_os_str().is_empty() {
        return Err(ConfigError::Validation("engine.binary is empty".into()));
    }
    if config.engine.run_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("engine.run_dir is empty".into()));
    }
    if config.http.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "http.timeout_secs must be > 0".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ManagerConfig::default();
        validate_config(&config).unwrap();
    }

    #[test]
    fn rejects_bad_listen() {
        let mut config = ManagerConfig::default();
        config.manager.listen = "not-an-addr".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = ManagerConfig::default();
        config.http.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
