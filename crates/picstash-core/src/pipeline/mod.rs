//! Image ingestion pipeline components.
//!
//! This module contains all the stages an item passes through:
//! - **resolve**: Turn a URL, data URI or upload into a temporary object
//! - **fetch**: Remote GET behind the `Fetcher` trait
//! - **temp**: Self-deleting temporary objects
//! - **sniff**: Detect the image format from leading bytes
//! - **allocate**: Reserve collision-free destination names
//! - **processor**: Orchestrates the full pipeline per item and per batch
//! - **aggregate**: Combine outcomes into a batch verdict

pub mod aggregate;
pub mod allocate;
pub mod fetch;
pub mod processor;
pub mod resolve;
pub mod sniff;
pub mod temp;

use crate::error::PipelineError;

// Re-exports for convenient access
pub use aggregate::{aggregate, BatchReport, BatchResponse, BatchStatus};
pub use allocate::{PathAllocator, Reservation};
pub use fetch::{FetchResponse, Fetcher, HttpFetcher};
pub use processor::Ingestor;
pub use resolve::SourceResolver;
pub use sniff::{sniff, sniff_bytes, DetectedFormat};
pub use temp::{TempStore, TemporaryObject};

/// Run blocking filesystem work off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Storage {
            path: std::path::PathBuf::new(),
            message: format!("Task join error: {}", e),
        })?
}
