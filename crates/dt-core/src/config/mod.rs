//! Configuration management for dvr-tunnel
//!
//! Every literal of the bootstrap procedure is a default here; a
//! `config.toml` only needs the values that differ.

mod bootstrap;
pub mod serde_utils;
mod viewer;

pub use bootstrap::{ArtifactConfig, BootstrapConfig, ResolvedArtifact, TunnelConfig};
pub use viewer::{DvrConfig, ViewerConfig, MAX_CHANNEL};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dvr-tunnel")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// On-disk layout of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub bootstrap: BootstrapConfig,
    pub viewer: ViewerConfig,
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Load the explicit config file, or the default one when it exists
///
/// An explicit path must exist. Without one, a missing default file yields
/// the built-in defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        load_config(&default_path)
    } else {
        tracing::debug!("No config at {:?}, using defaults", default_path);
        Ok(ConfigFile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageManagerKind;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[bootstrap]
package_manager = "dnf"

[viewer.dvr]
ip = "10.0.0.7"
"#,
        )
        .unwrap();

        let config: ConfigFile = load_config(&path).unwrap();
        assert_eq!(config.bootstrap.package_manager, PackageManagerKind::Dnf);
        assert_eq!(config.bootstrap.tunnel.local_url, "http://localhost:8000");
        assert_eq!(config.viewer.dvr.ip, "10.0.0.7");
        assert_eq!(config.viewer.dvr.channels, vec![1, 2]);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ConfigFile::default();
        config.bootstrap.packages = vec!["ffmpeg".to_string()];
        save_config(&path, &config).unwrap();

        let loaded: ConfigFile = load_config(&path).unwrap();
        assert_eq!(loaded.bootstrap.packages, vec!["ffmpeg"]);
    }

    #[test]
    fn test_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_or_default(Some(&missing)),
            Err(ConfigError::NotFound(_))
        ));
    }
}
