//! Configuration management for Squeeze.
//!
//! Configuration is loaded from the platform config directory with defaults
//! for every field, so a missing or partial file is always usable.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Squeeze.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Input table settings
    pub input: InputConfig,

    /// Download settings
    pub fetch: FetchConfig,

    /// Optimization settings
    pub optimize: OptimizeConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.squeeze.squeeze/config.toml
    /// - Linux: ~/.config/squeeze/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\squeeze\config\config.toml
    ///
    /// Falls back to ~/.squeeze/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "squeeze", "squeeze")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".squeeze").join("config.toml")
            })
    }

    /// Get the resolved cache root (with ~ expansion).
    pub fn cache_dir(&self) -> PathBuf {
        let path_str = self.general.cache_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Directory holding raw downloads, partitioned by content hash.
    pub fn download_dir(&self) -> PathBuf {
        self.cache_dir().join("downloads")
    }

    /// Directory holding optimized outputs, partitioned by content hash.
    pub fn optimized_dir(&self) -> PathBuf {
        self.cache_dir().join("optimized")
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
