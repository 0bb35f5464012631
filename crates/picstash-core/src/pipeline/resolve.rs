//! Source resolution: turn one submitted item into a temporary object.
//!
//! Every failure here is terminal for the item and carries the stage-level
//! [`PipelineError`] that the orchestrator collapses into a status.

use std::sync::Arc;
use std::time::Duration;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PipelineError;
use crate::types::{IngestionItem, TransferStatus, UploadBody, UploadedFile};

use super::fetch::Fetcher;
use super::run_blocking;
use super::temp::{TempStore, TemporaryObject};

static URL_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:https?|ftp)://").expect("URL scheme pattern is valid"));

static DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:(?:[A-Za-z0-9_/]*;)?base64,(.+)$").expect("data URI pattern is valid")
});

/// Standard alphabet; padding optional. Anything outside the alphabet is
/// still refused.
const DATA_URI_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Resolves items into temporary objects.
pub struct SourceResolver {
    fetcher: Arc<dyn Fetcher>,
    temp: TempStore,
    max_bytes: u64,
    fetch_timeout: Duration,
}

impl SourceResolver {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        temp: TempStore,
        max_bytes: u64,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            temp,
            max_bytes,
            fetch_timeout,
        }
    }

    /// Resolve one item.
    pub async fn resolve(&self, item: IngestionItem) -> Result<TemporaryObject, PipelineError> {
        match item {
            IngestionItem::Url(text) => self.resolve_url(&text).await,
            IngestionItem::Base64(text) => self.resolve_data_uri(&text).await,
            IngestionItem::Upload(file) => self.resolve_upload(file).await,
            IngestionItem::Unrecognized(text) => Err(PipelineError::InvalidSource(format!(
                "Not a URL or data URI: {}",
                text
            ))),
        }
    }

    async fn resolve_url(&self, text: &str) -> Result<TemporaryObject, PipelineError> {
        let url = parse_url(text)?;
        tracing::debug!("Fetching {} via {}", url, self.fetcher.name());

        let response = tokio::time::timeout(
            self.fetch_timeout,
            self.fetcher.get(url.as_str(), self.max_bytes),
        )
        .await
        .map_err(|_| PipelineError::Timeout {
            source_name: url.to_string(),
            stage: "fetch".to_string(),
            timeout_ms: self.fetch_timeout.as_millis() as u64,
        })??;

        if response.status != 200 {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                message: format!("HTTP {}", response.status),
                status_code: Some(response.status),
            });
        }
        if response.body.len() as u64 > self.max_bytes {
            return Err(self.too_large(url.as_str(), response.body.len() as u64));
        }

        let temp = self.temp.clone();
        run_blocking(move || temp.write_bytes(&response.body)).await
    }

    async fn resolve_data_uri(&self, text: &str) -> Result<TemporaryObject, PipelineError> {
        // Line-wrapped payloads are common; whitespace is not data
        let payload: Vec<u8> = parse_data_uri(text)?
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();

        // Reject oversized payloads before decoding them
        let decoded_estimate = (payload.len() as u64 / 4) * 3;
        if decoded_estimate > self.max_bytes.saturating_add(3) {
            return Err(self.too_large("data URI", decoded_estimate));
        }

        let bytes = DATA_URI_ENGINE
            .decode(&payload)
            .map_err(|e| PipelineError::Decode(e.to_string()))?;
        if bytes.is_empty() {
            return Err(PipelineError::Decode("empty payload".to_string()));
        }
        if bytes.len() as u64 > self.max_bytes {
            return Err(self.too_large("data URI", bytes.len() as u64));
        }

        let temp = self.temp.clone();
        run_blocking(move || temp.write_bytes(&bytes)).await
    }

    async fn resolve_upload(&self, file: UploadedFile) -> Result<TemporaryObject, PipelineError> {
        let UploadedFile {
            declared_name,
            transfer,
            body,
        } = file;

        if transfer != TransferStatus::Ok {
            return Err(PipelineError::Transfer {
                name: declared_name,
                transfer,
            });
        }

        match body {
            UploadBody::Spooled(temp) => {
                let len = temp
                    .len()
                    .map_err(|e| PipelineError::storage(temp.path(), e))?;
                if len > self.max_bytes {
                    return Err(self.too_large(&declared_name, len));
                }
                Ok(temp)
            }
            UploadBody::Reader(mut reader) => {
                let temp = self.temp.clone();
                let max_bytes = self.max_bytes;
                run_blocking(move || temp.copy_from(&mut *reader, max_bytes, &declared_name))
                    .await
            }
            UploadBody::Empty => Err(PipelineError::Transfer {
                name: declared_name,
                transfer: TransferStatus::NoFile,
            }),
        }
    }

    fn too_large(&self, source_name: &str, size: u64) -> PipelineError {
        PipelineError::FileTooLarge {
            source_name: source_name.to_string(),
            size_mb: size / (1024 * 1024),
            max_mb: self.max_bytes / (1024 * 1024),
        }
    }
}

/// Strict URL check: allowed scheme prefix, plain ASCII without whitespace
/// or control characters, and a well-formed absolute URL with a host.
pub fn parse_url(text: &str) -> Result<reqwest::Url, PipelineError> {
    let invalid = || PipelineError::InvalidSource(text.chars().take(120).collect());

    if !URL_SCHEME.is_match(text)
        || !text.is_ascii()
        || text.chars().any(|c| c.is_ascii_whitespace() || c.is_ascii_control())
    {
        return Err(invalid());
    }

    // The URL parser would quietly turn "http:///host" into "http://host/"
    match text.split_once("://") {
        Some((_, rest)) if !rest.is_empty() && !rest.starts_with('/') => {}
        _ => return Err(invalid()),
    }

    let url = reqwest::Url::parse(text).map_err(|_| invalid())?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(invalid()),
    }
}

/// Extract the base64 payload of a `data:[media-type;]base64,<payload>` string.
pub fn parse_data_uri(text: &str) -> Result<&str, PipelineError> {
    DATA_URI
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| PipelineError::InvalidSource("malformed data URI".to_string()))
}
