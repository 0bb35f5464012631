//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.images_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.images_dir must not be empty".into(),
            ));
        }
        if self.storage.max_allocation_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "storage.max_allocation_attempts must be > 0".into(),
            ));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.timeout_ms must be > 0".into(),
            ));
        }
        if self.fetch.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.connect_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.processing.parallel_items == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_items must be > 0".into(),
            ));
        }
        if self.upload.max_part_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_part_size_mb must be > 0".into(),
            ));
        }
        if self.server.max_body_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_body_size_mb must be > 0".into(),
            ));
        }
        Ok(())
    }
}
