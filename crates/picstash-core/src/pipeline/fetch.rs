//! Remote fetching for URL sources.
//!
//! The resolver talks to the network only through the [`Fetcher`] trait, so
//! the HTTP client can be swapped (or faked in tests) without touching the
//! pipeline.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::PipelineError;

/// Response of a GET request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body. Left empty for non-200 responses.
    pub body: Vec<u8>,
}

/// Blocking-style GET collaborator: `GET(url) -> (status, body) | error`.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the ingestor holds an `Arc<dyn Fetcher>`).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetcher name for logging.
    fn name(&self) -> &str;

    /// Fetch `url`, refusing bodies larger than `max_bytes`.
    async fn get(&self, url: &str, max_bytes: u64) -> Result<FetchResponse, PipelineError>;
}

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| PipelineError::Fetch {
                url: String::new(),
                message: format!("Failed to build HTTP client: {e}"),
                status_code: None,
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(&self, url: &str, max_bytes: u64) -> Result<FetchResponse, PipelineError> {
        let fetch_err = |message: String, status_code: Option<u16>| PipelineError::Fetch {
            url: url.to_string(),
            message,
            status_code,
        };

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(format!("Request failed: {e}"), None))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Ok(FetchResponse {
                status,
                body: Vec::new(),
            });
        }

        if let Some(declared) = resp.content_length() {
            if declared > max_bytes {
                return Err(too_large(url, declared, max_bytes));
            }
        }

        let mut body = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| fetch_err(format!("Body read failed: {e}"), Some(status)))?;
            if body.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(too_large(url, body.len() as u64 + chunk.len() as u64, max_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchResponse { status, body })
    }
}

fn too_large(url: &str, size: u64, max_bytes: u64) -> PipelineError {
    PipelineError::FileTooLarge {
        source_name: url.to_string(),
        size_mb: size / (1024 * 1024),
        max_mb: max_bytes / (1024 * 1024),
    }
}
