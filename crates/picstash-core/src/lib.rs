//! Picstash Core - Embeddable image ingestion library.
//!
//! Picstash accepts images as remote URLs, base64 data URIs or multipart
//! uploads, checks that each one really is an image by sniffing its leading
//! bytes, and stores it under a freshly generated, collision-free name.
//!
//! # Architecture
//!
//! Every item runs through the same pipeline and ends with exactly one
//! status:
//!
//! ```text
//! Item → Resolve → Sniff → Allocate → Commit → Outcome
//! ```
//!
//! A batch of outcomes is then aggregated into one verdict (accept if any
//! item was stored, reject otherwise).
//!
//! # Usage
//!
//! ```rust,ignore
//! use picstash_core::{Config, IngestionItem, Ingestor};
//!
//! #[tokio::main]
//! async fn main() -> picstash_core::Result<()> {
//!     let config = Config::load()?;
//!     let ingestor = Ingestor::from_config(&config)?;
//!     ingestor.ensure_dirs()?;
//!
//!     let outcome = ingestor
//!         .ingest_one(IngestionItem::from_text("https://example.com/cat.png"))
//!         .await;
//!     println!("{}: {:?}", outcome.status, outcome.stored_id);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod pipeline;
pub mod submission;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, PicstashError, PipelineError, PipelineResult, Result};
pub use pipeline::{BatchReport, BatchResponse, BatchStatus, Fetcher, Ingestor};
pub use submission::{parse_json_items, Rejection, SubmissionKind};
pub use types::{IngestionItem, Outcome, Status, TransferStatus, UploadBody, UploadedFile};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
