//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where images are stored and how destination names are reserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Managed directory that receives stored images
    pub images_dir: PathBuf,

    /// Directory for temporary objects. Defaults to `images_dir` so that
    /// commits are same-filesystem renames.
    ///
    /// A crashed process can leave hidden `.picstash-*.part` files here.
    /// Point this at another directory on the same filesystem to keep them
    /// out of `images_dir`.
    pub temp_dir: Option<PathBuf>,

    /// Attempts at reserving a fresh file name before giving up
    pub max_allocation_attempts: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("~/.picstash/images"),
            temp_dir: None,
            max_allocation_attempts: 16,
        }
    }
}

/// Remote fetch settings for URL sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Overall deadline for one fetch in milliseconds
    pub timeout_ms: u64,

    /// TCP/TLS connect deadline in milliseconds
    pub connect_timeout_ms: u64,

    /// Redirects followed before the fetch fails
    pub max_redirects: usize,

    /// User-Agent header sent with every fetch
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            max_redirects: 5,
            user_agent: format!("picstash/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum image size in megabytes, for every source form
    pub max_file_size_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
        }
    }
}

impl LimitsConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Items of one batch processed concurrently (1 = sequential).
    /// Results keep input order either way.
    pub parallel_items: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { parallel_items: 1 }
    }
}

/// Multipart upload transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest single file part in megabytes
    pub max_part_size_mb: u64,

    /// File extensions (without dot, case-insensitive) refused by the transport
    pub blocked_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_part_size_mb: 100,
            blocked_extensions: vec![],
        }
    }
}

impl UploadConfig {
    pub fn max_part_size_bytes(&self) -> u64 {
        self.max_part_size_mb.saturating_mul(1024 * 1024)
    }

    /// Whether the declared file name carries a blocked extension.
    pub fn is_blocked(&self, declared_name: &str) -> bool {
        let Some((_, ext)) = declared_name.rsplit_once('.') else {
            return false;
        };
        self.blocked_extensions
            .iter()
            .any(|blocked| blocked.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// HTTP front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Largest accepted request body in megabytes
    pub max_body_size_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_body_size_mb: 256,
        }
    }
}

impl ServerConfig {
    pub fn max_body_size_bytes(&self) -> u64 {
        self.max_body_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
