//! Configuration management.

use crate::error::{FabricError, Result};
use crate::paths;
use crate::types::VmKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fabric client binary used by the command transport
    pub minimega_binary: String,
    /// Base directory of the running fabric instance
    pub base_dir: String,
    /// Namespace used when a command does not name one
    pub namespace: Option<String>,
    /// VM type requested when redeploying
    pub vm_kind: VmKind,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minimega_binary: "minimega".to_string(),
            base_dir: "/tmp/minimega/".to_string(),
            namespace: None,
            vm_kind: VmKind::Kvm,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_file()
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| FabricError::InvalidConfig {
            reason: format!("Failed to read config {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| FabricError::InvalidConfig {
            reason: format!("Failed to parse config {}: {}", path.display(), e),
        })
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FabricError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| FabricError::InvalidConfig {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content).map_err(|e| FabricError::Io { path: path.to_path_buf(), source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();

        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"namespace": "exp1", "vm_kind": "container"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.namespace.as_deref(), Some("exp1"));
        assert_eq!(config.vm_kind, VmKind::Container);
        assert_eq!(config.minimega_binary, "minimega");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load_from(&path), Err(FabricError::InvalidConfig { .. })));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config { namespace: Some("exp2".to_string()), ..Config::default() };

        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
