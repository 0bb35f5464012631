//! Core data types for Picstash.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

use crate::pipeline::TemporaryObject;

/// Per-item result status, serialized with its wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Image stored; the outcome carries its generated file name
    Ok,
    /// Reserved. No pipeline path produces it.
    Duplicate,
    /// Source could not be read as an image (bad URL, fetch failure, bad base64)
    WrongImage,
    /// Content is not one of the supported image formats
    WrongImageType,
    /// Content or transfer exceeded a size limit
    WrongImageSize,
    /// Local storage failed
    CannotSave,
}

impl Status {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Duplicate => "duplicate",
            Status::WrongImage => "wrong_image",
            Status::WrongImageType => "wrong_image_type",
            Status::WrongImageSize => "wrong_image_size",
            Status::CannotSave => "cannot_save",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one item through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: Status,
    /// Generated file name, present only when `status` is `Ok`
    pub stored_id: Option<String>,
}

impl Outcome {
    pub fn stored(file_name: String) -> Self {
        Self {
            status: Status::Ok,
            stored_id: Some(file_name),
        }
    }

    pub fn failed(status: Status) -> Self {
        Self {
            status,
            stored_id: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// How the upload transport reports a file part's arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Part arrived intact
    Ok,
    /// Part exceeded the server-wide body limit
    ExceedsServerLimit,
    /// Part exceeded the per-part limit
    ExceedsFormLimit,
    /// Stream ended mid-part
    Partial,
    /// Part carried no file
    NoFile,
    /// No temporary storage was available to receive the part
    NoTempDir,
    /// Receiving the part to temporary storage failed
    CantWrite,
    /// Transport refused the part by its file extension
    BlockedExtension,
}

impl TransferStatus {
    /// Status an abnormal transfer produces, or `None` for a normal one.
    pub fn rejection(self) -> Option<Status> {
        match self {
            TransferStatus::Ok => None,
            TransferStatus::ExceedsServerLimit | TransferStatus::ExceedsFormLimit => {
                Some(Status::WrongImageSize)
            }
            TransferStatus::BlockedExtension => Some(Status::WrongImageType),
            TransferStatus::NoTempDir => Some(Status::WrongImage),
            TransferStatus::Partial | TransferStatus::NoFile | TransferStatus::CantWrite => {
                Some(Status::CannotSave)
            }
        }
    }
}

/// Bytes of an uploaded file part.
pub enum UploadBody {
    /// Already received into local temporary storage; adopted without copying
    Spooled(TemporaryObject),
    /// Any other byte stream; copied into a fresh temporary object
    Reader(Box<dyn Read + Send>),
    /// Nothing was received (the transfer failed before any bytes arrived)
    Empty,
}

impl fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadBody::Spooled(temp) => f.debug_tuple("Spooled").field(&temp.path()).finish(),
            UploadBody::Reader(_) => f.write_str("Reader(..)"),
            UploadBody::Empty => f.write_str("Empty"),
        }
    }
}

/// A file part handed over by the upload transport.
#[derive(Debug)]
pub struct UploadedFile {
    /// Client-supplied file name. Logged, never trusted.
    pub declared_name: String,
    pub transfer: TransferStatus,
    pub body: UploadBody,
}

impl UploadedFile {
    pub fn new(declared_name: impl Into<String>, transfer: TransferStatus, body: UploadBody) -> Self {
        Self {
            declared_name: declared_name.into(),
            transfer,
            body,
        }
    }

    /// An upload the transport failed to deliver.
    pub fn failed(declared_name: impl Into<String>, transfer: TransferStatus) -> Self {
        Self::new(declared_name, transfer, UploadBody::Empty)
    }
}

/// One submitted source.
#[derive(Debug)]
pub enum IngestionItem {
    /// Remote URL (validated strictly by the resolver)
    Url(String),
    /// `data:[media-type;]base64,<payload>` string (validated strictly by the resolver)
    Base64(String),
    /// Multipart file part
    Upload(UploadedFile),
    /// Submitted element that is not a string, kept as its JSON text
    Unrecognized(String),
}

impl IngestionItem {
    /// Classify a submitted string.
    ///
    /// Only the `data:` prefix is looked at here. Whatever is not a data URI
    /// is treated as a URL and must pass URL validation, so strings matching
    /// neither form end up as `wrong_image`.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.starts_with("data:") {
            IngestionItem::Base64(text)
        } else {
            IngestionItem::Url(text)
        }
    }

    /// Short description for logs; never includes payload bytes.
    pub fn describe(&self) -> String {
        match self {
            IngestionItem::Url(url) => truncate(url, 120),
            IngestionItem::Base64(data) => format!("data URI ({} chars)", data.len()),
            IngestionItem::Upload(file) => format!("upload {:?}", file.declared_name),
            IngestionItem::Unrecognized(text) => format!("unrecognized {}", truncate(text, 40)),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&vec![
            Status::Ok,
            Status::Duplicate,
            Status::WrongImage,
            Status::WrongImageType,
            Status::WrongImageSize,
            Status::CannotSave,
        ])
        .unwrap();
        assert_eq!(
            json,
            r#"["ok","duplicate","wrong_image","wrong_image_type","wrong_image_size","cannot_save"]"#
        );
        assert_eq!(Status::WrongImageSize.to_string(), "wrong_image_size");
    }

    #[test]
    fn test_from_text_classification() {
        assert!(matches!(
            IngestionItem::from_text("data:base64,AAAA"),
            IngestionItem::Base64(_)
        ));
        assert!(matches!(
            IngestionItem::from_text("https://example.com/a.png"),
            IngestionItem::Url(_)
        ));
        assert!(matches!(
            IngestionItem::from_text("garbage"),
            IngestionItem::Url(_)
        ));
    }

    #[test]
    fn test_transfer_ok_is_not_a_rejection() {
        assert_eq!(TransferStatus::Ok.rejection(), None);
        assert_eq!(
            TransferStatus::ExceedsFormLimit.rejection(),
            Some(Status::WrongImageSize)
        );
    }

    #[test]
    fn test_describe_unrecognized_element() {
        let item = IngestionItem::Unrecognized("{\"a\":1}".to_string());
        assert_eq!(item.describe(), "unrecognized {\"a\":1}");
    }

    #[test]
    fn test_describe_truncates_long_urls() {
        let url = format!("https://example.com/{}", "a".repeat(500));
        let described = IngestionItem::from_text(url).describe();
        assert!(described.len() < 130);
        assert!(described.ends_with("..."));
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = Outcome::stored("abc.png".to_string());
        assert!(ok.is_ok());
        assert_eq!(ok.stored_id.as_deref(), Some("abc.png"));

        let failed = Outcome::failed(Status::CannotSave);
        assert!(!failed.is_ok());
        assert!(failed.stored_id.is_none());
    }
}
