//! The `picstash ingest` command: run a batch from the command line.

use std::fs::File;
use std::path::{Path, PathBuf};

use clap::Args;
use picstash_core::{
    BatchReport, BatchStatus, Config, IngestionItem, Ingestor, TransferStatus, UploadBody,
    UploadedFile,
};

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// URLs or base64 data URIs
    pub sources: Vec<String>,

    /// Local image files to upload (repeatable)
    #[arg(short, long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Pretty-print the batch response
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the ingest command.
pub async fn execute(args: IngestArgs, config: Config) -> anyhow::Result<()> {
    let ingestor = Ingestor::from_config(&config)?;
    ingestor.ensure_dirs()?;

    let mut items: Vec<IngestionItem> = args
        .sources
        .into_iter()
        .map(IngestionItem::from_text)
        .collect();
    items.extend(args.files.iter().map(|path| open_upload(path)));

    let report = ingestor
        .ingest_batch(items)
        .await
        .map_err(|_| anyhow::anyhow!("Nothing to ingest: pass URLs, data URIs or --file paths"))?;

    println!("{}", render(&report, args.pretty)?);

    if report.status == BatchStatus::Reject {
        anyhow::bail!("No image was stored");
    }
    tracing::info!(
        "Stored {} image(s) in {}",
        report.stored_count(),
        ingestor.images_dir().display()
    );
    Ok(())
}

/// Present a local file the way the upload transport would.
fn open_upload(path: &Path) -> IngestionItem {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!("Cannot open {:?}: {}", path, e);
            return IngestionItem::Upload(UploadedFile::failed(name, TransferStatus::NoFile));
        }
    };
    IngestionItem::Upload(UploadedFile::new(
        name,
        TransferStatus::Ok,
        UploadBody::Reader(Box::new(file)),
    ))
}

fn render(report: &BatchReport, pretty: bool) -> serde_json::Result<String> {
    let response = report.response();
    if pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_becomes_failed_upload() {
        let dir = tempfile::tempdir().unwrap();
        let item = open_upload(&dir.path().join("gone.png"));

        let IngestionItem::Upload(upload) = item else {
            panic!("expected an upload");
        };
        assert_eq!(upload.declared_name, "gone.png");
        assert_eq!(upload.transfer, TransferStatus::NoFile);
    }

    #[tokio::test]
    async fn test_local_files_are_ingested() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let source = dir.path().join("pic.gif");
        std::fs::write(&source, b"GIF89a\x01\x00\x01\x00\x00\x00\x00;").unwrap();

        let mut config = Config::default();
        config.storage.images_dir = images.clone();
        let ingestor = Ingestor::from_config(&config).unwrap();
        ingestor.ensure_dirs().unwrap();

        let report = ingestor
            .ingest_batch(vec![open_upload(&source)])
            .await
            .unwrap();
        assert_eq!(report.status, BatchStatus::Accept);

        let json = render(&report, false).unwrap();
        assert!(json.starts_with(r#"{"result":["ok"],"ids":[""#));
        assert!(json.contains(".gif"));
    }
}
