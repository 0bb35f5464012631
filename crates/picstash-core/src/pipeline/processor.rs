//! Pipeline orchestration - wires together all ingestion stages.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};

use crate::config::Config;
use crate::error::PipelineError;
use crate::submission::Rejection;
use crate::types::{IngestionItem, Outcome};

use super::aggregate::{aggregate, BatchReport};
use super::allocate::PathAllocator;
use super::fetch::{Fetcher, HttpFetcher};
use super::resolve::SourceResolver;
use super::run_blocking;
use super::sniff::sniff;
use super::temp::TempStore;

/// Runs items through resolve, sniff, allocate and commit.
pub struct Ingestor {
    resolver: SourceResolver,
    allocator: PathAllocator,
    temp: TempStore,
    parallel_items: usize,
}

impl Ingestor {
    /// Create an ingestor that fetches URLs through `fetcher`.
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>) -> Self {
        let temp = TempStore::new(config.temp_dir());
        Self {
            resolver: SourceResolver::new(
                fetcher,
                temp.clone(),
                config.limits.max_file_size_bytes(),
                Duration::from_millis(config.fetch.timeout_ms),
            ),
            allocator: PathAllocator::new(
                config.images_dir(),
                config.storage.max_allocation_attempts,
            ),
            temp,
            parallel_items: config.processing.parallel_items.max(1),
        }
    }

    /// Create an ingestor backed by the HTTP fetcher.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    /// Managed directory that stored images land in.
    pub fn images_dir(&self) -> &Path {
        self.allocator.dir()
    }

    /// Store that transports spool uploads into.
    pub fn temp_store(&self) -> &TempStore {
        &self.temp
    }

    /// Create the managed and temporary directories if missing.
    pub fn ensure_dirs(&self) -> Result<(), PipelineError> {
        for dir in [self.allocator.dir(), self.temp.dir()] {
            std::fs::create_dir_all(dir).map_err(|e| PipelineError::storage(dir, e))?;
        }
        Ok(())
    }

    /// Run one item through the pipeline.
    ///
    /// Never fails: every error is collapsed into the item's status.
    pub async fn ingest_one(&self, item: IngestionItem) -> Outcome {
        let start = Instant::now();
        let source = item.describe();
        tracing::debug!("Ingesting: {}", source);

        match self.run(item).await {
            Ok(file_name) => {
                tracing::debug!("Stored {} as {} in {:?}", source, file_name, start.elapsed());
                Outcome::stored(file_name)
            }
            Err(e) => {
                let status = e.status();
                tracing::warn!("Rejected {} ({}): {}", source, status, e);
                Outcome::failed(status)
            }
        }
    }

    /// Run a batch, preserving input order in the report.
    pub async fn ingest_batch(
        &self,
        items: Vec<IngestionItem>,
    ) -> Result<BatchReport, Rejection> {
        if items.is_empty() {
            return Err(Rejection::Malformed);
        }

        let start = Instant::now();
        let total = items.len();
        let outcomes: Vec<Outcome> = stream::iter(items)
            .map(|item| self.ingest_one(item))
            .buffered(self.parallel_items)
            .collect()
            .await;

        let report = aggregate(outcomes);
        tracing::info!(
            "Batch done: {}/{} stored in {:?} (HTTP {})",
            report.stored_count(),
            total,
            start.elapsed(),
            report.status.http_status()
        );
        Ok(report)
    }

    async fn run(&self, item: IngestionItem) -> Result<String, PipelineError> {
        // Resolve
        let resolve_start = Instant::now();
        let temp = self.resolver.resolve(item).await?;
        tracing::trace!("  Resolve: {:?}", resolve_start.elapsed());

        // Sniff, allocate and commit touch the filesystem only
        let allocator = self.allocator.clone();
        run_blocking(move || {
            let format = sniff(temp.path())
                .ok_or_else(|| PipelineError::UnsupportedFormat(temp.path().to_path_buf()))?;
            tracing::trace!("  Sniffed: {:?}", format);

            let reservation = allocator.allocate(format.extension())?;
            let dest = reservation.path().to_path_buf();
            let file_name = reservation.file_name().to_string();

            match temp.persist(&dest) {
                Ok(()) => Ok(file_name),
                Err(e) => {
                    reservation.release();
                    Err(e)
                }
            }
        })
        .await
    }
}
