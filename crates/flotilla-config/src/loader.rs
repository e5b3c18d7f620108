//! Config file reading.
//!
//! The manager accepts json/jsonc, yaml, or toml, picked by file
//! extension; errors carry the offending path so startup diagnostics
//! point somewhere useful.

use std::path::{Path, PathBuf};

use crate::ManagerConfig;

#[derive(Debug, Clone, Copy)]
enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    fn detect(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str())? {
            "json" | "jsonc" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("unrecognized config extension: {}", .0.display())]
    UnknownFormat(PathBuf),
    #[error("validation: {0}")]
    Validation(String),
}

pub fn load_config(path: impl AsRef<Path>) -> Result<ManagerConfig, ConfigError> {
    let path = path.as_ref();
    let format =
        Format::detect(path).ok_or_else(|| ConfigError::UnknownFormat(path.to_path_buf()))?;
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(format, &data).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn parse(format: Format, data: &str) -> Result<ManagerConfig, String> {
    match format {
        Format::Json => {
            let stripped = json_comments::StripComments::new(data.as_bytes());
            serde_json::from_reader(stripped).map_err(|e| e.to_string())
        }
        Format::Yaml => serde_yaml::from_str(data).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(data).map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(ext: &str, contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("manager.{ext}"));
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_toml() {
        let (_dir, path) = write_temp("toml", "[manager]\nlisten = \"0.0.0.0:9000\"\n");
        let config = load_config(&path).unwrap();
        assert_eq!(config.manager.listen, "0.0.0.0:9000");
    }

    #[test]
    fn loads_jsonc_with_comments() {
        let (_dir, path) = write_temp(
            "jsonc",
            r#"{
  // control-plane listener
  "manager": { "listen": "127.0.0.1:7070" }
}"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.manager.listen, "127.0.0.1:7070");
    }

    #[test]
    fn loads_yaml() {
        let (_dir, path) = write_temp("yaml", "manager:\n  listen: 127.0.0.1:7071\n");
        let config = load_config(&path).unwrap();
        assert_eq!(config.manager.listen, "127.0.0.1:7071");
    }

    #[test]
    fn rejects_unknown_extension() {
        let (_dir, path) = write_temp("ini", "listen = nope");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::UnknownFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        let (_dir, path) = write_temp("toml", "[manager\nlisten =");
        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
