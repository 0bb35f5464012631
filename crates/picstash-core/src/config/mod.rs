//! Configuration management for Picstash.
//!
//! Configuration is loaded from the platform config directory (falling back
//! to `~/.picstash/config.toml`) with sensible defaults for every field.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Picstash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Managed directory and name reservation
    pub storage: StorageConfig,

    /// Remote fetch settings
    pub fetch: FetchConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Batch processing settings
    pub processing: ProcessingConfig,

    /// Multipart transport settings
    pub upload: UploadConfig,

    /// HTTP front-end settings
    pub server: ServerConfig,

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
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.picstash.picstash/config.toml
    /// - Linux: ~/.config/picstash/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\picstash\config\config.toml
    ///
    /// Falls back to ~/.picstash/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "picstash", "picstash")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".picstash").join("config.toml")
            })
    }

    /// Get the resolved images directory (with ~ expansion).
    pub fn images_dir(&self) -> PathBuf {
        expand(&self.storage.images_dir)
    }

    /// Get the resolved temporary directory.
    ///
    /// Falls back to the images directory when unset.
    pub fn temp_dir(&self) -> PathBuf {
        self.storage
            .temp_dir
            .as_deref()
            .map(expand)
            .unwrap_or_else(|| self.images_dir())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}
