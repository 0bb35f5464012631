//! Error types for the Picstash ingestion pipeline.
//!
//! Pipeline errors are organized by stage and carry enough context (URL,
//! path, upload name) to be logged usefully. None of them ever reaches a
//! client as-is: [`PipelineError::status`] collapses each one into the
//! wire-level [`Status`] vocabulary.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{Status, TransferStatus};

/// Top-level error type for Picstash operations.
#[derive(Error, Debug)]
pub enum PicstashError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-item pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Submitted text is neither a well-formed URL nor a base64 data URI
    #[error("Unrecognized source: {0}")]
    InvalidSource(String),

    /// Data URI payload is not strict base64
    #[error("Base64 decode failed: {0}")]
    Decode(String),

    /// Remote fetch failed or answered with something other than 200
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {source_name} after {timeout_ms}ms")]
    Timeout {
        source_name: String,
        stage: String,
        timeout_ms: u64,
    },

    /// Content exceeds the configured size limit
    #[error("Source too large: {source_name} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        source_name: String,
        size_mb: u64,
        max_mb: u64,
    },

    /// The upload transport reported a failed transfer
    #[error("Upload {name:?} failed in transport: {transfer:?}")]
    Transfer {
        name: String,
        transfer: TransferStatus,
    },

    /// Content did not match any supported image signature
    #[error("Unsupported image format for {0}")]
    UnsupportedFormat(PathBuf),

    /// Local storage failed (temporary write, commit rename, ...)
    #[error("Storage error for {path}: {message}")]
    Storage { path: PathBuf, message: String },

    /// No free destination name could be reserved
    #[error("Could not reserve a file name in {dir} after {attempts} attempts")]
    AllocationExhausted { dir: PathBuf, attempts: u32 },
}

impl PipelineError {
    /// Collapse this error into the status reported for its item.
    ///
    /// Network and parse failures become `wrong_image`, host-local storage
    /// failures become `cannot_save`, and explicit size/type rejections keep
    /// their own statuses.
    pub fn status(&self) -> Status {
        match self {
            PipelineError::InvalidSource(_)
            | PipelineError::Decode(_)
            | PipelineError::Fetch { .. }
            | PipelineError::Timeout { .. } => Status::WrongImage,
            PipelineError::FileTooLarge { .. } => Status::WrongImageSize,
            PipelineError::UnsupportedFormat(_) => Status::WrongImageType,
            PipelineError::Transfer { transfer, .. } => {
                transfer.rejection().unwrap_or(Status::CannotSave)
            }
            PipelineError::Storage { .. } | PipelineError::AllocationExhausted { .. } => {
                Status::CannotSave
            }
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        PipelineError::Storage {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Convenience type alias for Picstash results.
pub type Result<T> = std::result::Result<T, PicstashError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_failures_are_wrong_image() {
        let err = PipelineError::Fetch {
            url: "http://example.com/a.png".to_string(),
            message: "HTTP 404".to_string(),
            status_code: Some(404),
        };
        assert_eq!(err.status(), Status::WrongImage);

        let err = PipelineError::Timeout {
            source_name: "http://example.com/a.png".to_string(),
            stage: "fetch".to_string(),
            timeout_ms: 100,
        };
        assert_eq!(err.status(), Status::WrongImage);
    }

    #[test]
    fn test_storage_failures_are_cannot_save() {
        let err = PipelineError::storage("/tmp/x", "disk full");
        assert_eq!(err.status(), Status::CannotSave);

        let err = PipelineError::AllocationExhausted {
            dir: PathBuf::from("/tmp"),
            attempts: 3,
        };
        assert_eq!(err.status(), Status::CannotSave);
    }

    #[test]
    fn test_transfer_rejections_keep_their_status() {
        let status = |transfer| PipelineError::Transfer {
            name: "a.png".to_string(),
            transfer,
        }
        .status();

        assert_eq!(status(TransferStatus::ExceedsServerLimit), Status::WrongImageSize);
        assert_eq!(status(TransferStatus::ExceedsFormLimit), Status::WrongImageSize);
        assert_eq!(status(TransferStatus::BlockedExtension), Status::WrongImageType);
        assert_eq!(status(TransferStatus::NoTempDir), Status::WrongImage);
        assert_eq!(status(TransferStatus::Partial), Status::CannotSave);
        assert_eq!(status(TransferStatus::NoFile), Status::CannotSave);
        assert_eq!(status(TransferStatus::CantWrite), Status::CannotSave);
    }

    #[test]
    fn test_unsupported_format_is_wrong_image_type() {
        let err = PipelineError::UnsupportedFormat(PathBuf::from("x"));
        assert_eq!(err.status(), Status::WrongImageType);
    }
}
