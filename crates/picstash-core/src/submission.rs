//! Request boundary: classify the submission encoding and parse JSON bodies.
//!
//! Both checks run once, before any item reaches the pipeline.

use serde_json::Value;

use crate::types::IngestionItem;

/// Submission encoding, resolved from the declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    /// JSON array of URL / data URI strings
    Json,
    /// Form upload carrying file parts
    Multipart,
    /// Anything else
    Unsupported,
}

impl SubmissionKind {
    /// Classify a `Content-Type` header value.
    ///
    /// Parameters (`; charset=...`, `; boundary=...`) are ignored and the
    /// media type is compared case-insensitively.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(value) = content_type else {
            return SubmissionKind::Unsupported;
        };
        let media_type = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();

        match media_type.as_str() {
            "application/json" | "application/vnd.api+json" => SubmissionKind::Json,
            "multipart/form-data" | "application/x-www-form-urlencoded" => {
                SubmissionKind::Multipart
            }
            _ => SubmissionKind::Unsupported,
        }
    }
}

/// Batch-level refusal, raised before any item is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// Body is not a non-empty ordered collection of items
    #[error("malformed or empty submission")]
    Malformed,
    /// Submission encoding is not supported
    #[error("unsupported submission encoding")]
    UnsupportedMedia,
}

impl Rejection {
    pub fn http_status(&self) -> u16 {
        match self {
            Rejection::Malformed => 400,
            Rejection::UnsupportedMedia => 415,
        }
    }
}

/// Parse a JSON body into items.
///
/// The body must be a non-empty array. A string element is classified by
/// [`IngestionItem::from_text`]; any other element is kept in place as
/// [`IngestionItem::Unrecognized`] and fails on its own as `wrong_image`.
pub fn parse_json_items(body: &[u8]) -> Result<Vec<IngestionItem>, Rejection> {
    let value: Value = serde_json::from_slice(body).map_err(|_| Rejection::Malformed)?;
    let Value::Array(elements) = value else {
        return Err(Rejection::Malformed);
    };
    if elements.is_empty() {
        return Err(Rejection::Malformed);
    }

    Ok(elements
        .into_iter()
        .map(|element| match element {
            Value::String(text) => IngestionItem::from_text(text),
            other => IngestionItem::Unrecognized(other.to_string()),
        })
        .collect())
}
