//! Multipart upload transport.
//!
//! Spools every file part into a temporary object and reports how the
//! transfer went, so that the pipeline sees uploads exactly like any other
//! source.

use std::io::Write;

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use picstash_core::config::UploadConfig;
use picstash_core::pipeline::{TempStore, TemporaryObject};
use picstash_core::{IngestionItem, TransferStatus, UploadBody, UploadedFile};

/// Bytes of field content the whole request may still carry.
#[derive(Debug)]
pub struct BodyBudget {
    remaining: u64,
}

impl BodyBudget {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            remaining: max_bytes,
        }
    }

    /// Charge `n` bytes. Returns false once the budget is overdrawn.
    fn spend(&mut self, n: u64) -> bool {
        match self.remaining.checked_sub(n) {
            Some(left) => {
                self.remaining = left;
                true
            }
            None => {
                self.remaining = 0;
                false
            }
        }
    }
}

/// Why a part stopped being read early.
enum Cut {
    /// The request as a whole ran past its body budget
    OverBudget,
    /// The request stream broke
    Broken,
}

/// Read all file parts of a form, in order.
///
/// Non-file fields are skipped but still count against `budget`. The part
/// that overdraws the budget is reported as exceeding the server limit, a
/// stream error reports the current part as partial, and either way no
/// further parts are read.
pub async fn collect_uploads(
    mut multipart: Multipart,
    temp: &TempStore,
    upload: &UploadConfig,
    mut budget: BodyBudget,
) -> Vec<IngestionItem> {
    let mut items = Vec::new();

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Multipart stream ended abnormally: {}", e);
                break;
            }
        };
        let Some(name) = field.file_name().map(str::to_owned) else {
            if let Err(cut) = drain(&mut field, &mut budget).await {
                tracing::warn!("Form ended inside a text field ({})", cut.describe());
                break;
            }
            continue;
        };

        let (uploaded, stream_ended) = receive_part(field, name, temp, upload, &mut budget).await;
        tracing::debug!(
            "Received part {:?}: {:?}",
            uploaded.declared_name,
            uploaded.transfer
        );
        items.push(IngestionItem::Upload(uploaded));
        if stream_ended {
            break;
        }
    }

    items
}

/// Receive one file part. The flag is set when no further parts can be read.
async fn receive_part(
    mut field: Field<'_>,
    name: String,
    temp: &TempStore,
    upload: &UploadConfig,
    budget: &mut BodyBudget,
) -> (UploadedFile, bool) {
    if upload.is_blocked(&name) {
        return skip_part(field, name, TransferStatus::BlockedExtension, budget).await;
    }

    let mut spool = match temp.create() {
        Ok(spool) => spool,
        Err(e) => {
            tracing::warn!("No temporary storage for part {:?}: {}", name, e);
            return skip_part(field, name, TransferStatus::NoTempDir, budget).await;
        }
    };

    let max_bytes = upload.max_part_size_bytes();
    let mut received: u64 = 0;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if !budget.spend(chunk.len() as u64) {
                    return (cut_short(name, Cut::OverBudget), true);
                }
                received += chunk.len() as u64;
                if received > max_bytes {
                    drop(spool);
                    return skip_part(field, name, TransferStatus::ExceedsFormLimit, budget).await;
                }
                if let Err(e) = write_chunk(&mut spool, &chunk) {
                    tracing::warn!("Failed to spool part {:?}: {}", name, e);
                    drop(spool);
                    return skip_part(field, name, TransferStatus::CantWrite, budget).await;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Part {:?} interrupted: {}", name, e);
                return (cut_short(name, Cut::Broken), true);
            }
        }
    }

    if received == 0 && name.is_empty() {
        return (UploadedFile::failed(name, TransferStatus::NoFile), false);
    }
    (
        UploadedFile::new(name, TransferStatus::Ok, UploadBody::Spooled(spool)),
        false,
    )
}

/// Report a part as failed and read past the rest of it.
///
/// If the rest cannot be read, the reading failure replaces `transfer`.
async fn skip_part(
    mut field: Field<'_>,
    name: String,
    transfer: TransferStatus,
    budget: &mut BodyBudget,
) -> (UploadedFile, bool) {
    match drain(&mut field, budget).await {
        Ok(()) => (UploadedFile::failed(name, transfer), false),
        Err(cut) => (cut_short(name, cut), true),
    }
}

async fn drain(field: &mut Field<'_>, budget: &mut BodyBudget) -> Result<(), Cut> {
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if !budget.spend(chunk.len() as u64) {
                    return Err(Cut::OverBudget);
                }
            }
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::debug!("Field unreadable: {}", e);
                return Err(Cut::Broken);
            }
        }
    }
}

fn cut_short(name: String, cut: Cut) -> UploadedFile {
    UploadedFile::failed(name, cut.transfer())
}

impl Cut {
    fn transfer(&self) -> TransferStatus {
        match self {
            Cut::OverBudget => TransferStatus::ExceedsServerLimit,
            Cut::Broken => TransferStatus::Partial,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Cut::OverBudget => "body limit reached",
            Cut::Broken => "stream error",
        }
    }
}

fn write_chunk(spool: &mut TemporaryObject, chunk: &[u8]) -> std::io::Result<()> {
    spool.as_file_mut().write_all(chunk)
}
