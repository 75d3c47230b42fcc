//! Centralized path configuration.

use std::path::PathBuf;

/// Get the configuration directory.
///
/// Resolution order:
/// 1. `FABRIC_CONFIG_DIR` environment variable
/// 2. `<platform config dir>/fabric` (e.g. `~/.config/fabric`)
/// 3. `/etc/fabric` when no home directory is known
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FABRIC_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    dirs::config_dir().map(|d| d.join("fabric")).unwrap_or_else(|| PathBuf::from("/etc/fabric"))
}

/// Get the configuration file path.
///
/// `FABRIC_CONFIG` overrides the location entirely.
pub fn config_file() -> PathBuf {
    if let Ok(path) = std::env::var("FABRIC_CONFIG") {
        return PathBuf::from(path);
    }

    config_dir().join("config.json")
}
