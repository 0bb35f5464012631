//! End-to-end ingestion tests driven through an in-memory fetcher.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use picstash_core::pipeline::{FetchResponse, TempStore};
use picstash_core::{
    parse_json_items, BatchStatus, Config, Fetcher, IngestionItem, Ingestor, PipelineError,
    Rejection, Status, TransferStatus, UploadBody, UploadedFile,
};

/// PNG signature followed by a 1x1 IHDR chunk.
const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
    0x77, 0x53, 0xDE,
];

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

const HTML: &[u8] = b"<!doctype html><html><body>not an image</body></html>";

/// Serves canned responses keyed by URL; unknown URLs answer 404.
#[derive(Default)]
struct MemoryFetcher {
    routes: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    fn with(mut self, url: &str, body: &[u8]) -> Self {
        self.routes.insert(url.to_string(), body.to_vec());
        self
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, url: &str, _max_bytes: u64) -> Result<FetchResponse, PipelineError> {
        Ok(match self.routes.get(url) {
            Some(body) => FetchResponse {
                status: 200,
                body: body.clone(),
            },
            None => FetchResponse {
                status: 404,
                body: Vec::new(),
            },
        })
    }
}

fn config_for(images: &Path) -> Config {
    let mut config = Config::default();
    config.storage.images_dir = images.to_path_buf();
    config
}

fn ingestor(images: &Path, fetcher: MemoryFetcher) -> Ingestor {
    Ingestor::new(&config_for(images), Arc::new(fetcher))
}

fn data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        media_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

fn upload(name: &str, bytes: &[u8]) -> IngestionItem {
    IngestionItem::Upload(UploadedFile::new(
        name,
        TransferStatus::Ok,
        UploadBody::Reader(Box::new(std::io::Cursor::new(bytes.to_vec()))),
    ))
}

fn leftover_temporaries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| TempStore::is_temporary_name(path))
        .map(|path| path.display().to_string())
        .collect()
}

#[tokio::test]
async fn png_by_url_is_stored_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MemoryFetcher::default().with("https://img.test/cat.png", PNG);
    let ingestor = ingestor(dir.path(), fetcher);

    let items = parse_json_items(br#"["https://img.test/cat.png"]"#).unwrap();
    let report = ingestor.ingest_batch(items).await.unwrap();

    assert_eq!(report.status, BatchStatus::Accept);
    let response = report.response();
    assert_eq!(response.result, vec![Status::Ok]);
    let id = response.ids[0].clone().unwrap();
    assert!(id.ends_with(".png"));
    assert_eq!(std::fs::read(dir.path().join(&id)).unwrap(), PNG);
}

#[tokio::test]
async fn html_by_url_is_wrong_image_type() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MemoryFetcher::default().with("https://img.test/page", HTML);
    let ingestor = ingestor(dir.path(), fetcher);

    let items = parse_json_items(br#"["https://img.test/page"]"#).unwrap();
    let report = ingestor.ingest_batch(items).await.unwrap();

    assert_eq!(report.status, BatchStatus::Reject);
    assert_eq!(report.status.http_status(), 400);
    let response = report.response();
    assert_eq!(response.result, vec![Status::WrongImageType]);
    assert_eq!(response.ids, vec![None]);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn unrecognized_strings_never_store() {
    let dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(dir.path(), MemoryFetcher::default());

    for text in [
        "",
        "cat.png",
        "//img.test/cat.png",
        "mailto:someone@img.test",
        "data:image/png,rawbytes",
        "https://img.test/missing.png",
    ] {
        let outcome = ingestor.ingest_one(IngestionItem::from_text(text)).await;
        assert_eq!(outcome.status, Status::WrongImage, "{text:?}");
        assert_eq!(outcome.stored_id, None);
    }
}

#[tokio::test]
async fn base64_round_trip_preserves_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(dir.path(), MemoryFetcher::default());

    let outcome = ingestor
        .ingest_one(IngestionItem::from_text(data_uri("image/jpeg", JPEG)))
        .await;
    assert_eq!(outcome.status, Status::Ok);
    let id = outcome.stored_id.unwrap();
    assert!(id.ends_with(".jpg"));
    assert_eq!(std::fs::read(dir.path().join(id)).unwrap(), JPEG);
}

#[tokio::test]
async fn extension_follows_content_not_claims() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MemoryFetcher::default().with("https://img.test/photo.jpg", PNG);
    let ingestor = ingestor(dir.path(), fetcher);

    let items = vec![
        IngestionItem::from_text("https://img.test/photo.jpg"),
        IngestionItem::from_text(data_uri("image/gif", PNG)),
        upload("holiday.jpeg", PNG),
    ];
    let report = ingestor.ingest_batch(items).await.unwrap();

    for outcome in &report.outcomes {
        assert_eq!(outcome.status, Status::Ok);
        assert!(outcome.stored_id.as_ref().unwrap().ends_with(".png"));
    }
}

#[tokio::test]
async fn corrupted_base64_is_wrong_image() {
    let dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(dir.path(), MemoryFetcher::default());

    let items = parse_json_items(br#"["data:image/png;base64,iVBOR%%w0KGgo="]"#).unwrap();
    let report = ingestor.ingest_batch(items).await.unwrap();

    assert_eq!(report.status, BatchStatus::Reject);
    let response = report.response();
    assert_eq!(response.result, vec![Status::WrongImage]);
    assert_eq!(response.ids, vec![None]);
}

#[tokio::test]
async fn upload_batch_with_size_failure_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(dir.path(), MemoryFetcher::default());

    let items = vec![
        upload("cat.png", PNG),
        IngestionItem::Upload(UploadedFile::failed(
            "huge.png",
            TransferStatus::ExceedsFormLimit,
        )),
    ];
    let report = ingestor.ingest_batch(items).await.unwrap();

    assert_eq!(report.status, BatchStatus::Accept);
    assert_eq!(report.status.http_status(), 200);
    let response = report.response();
    assert_eq!(response.result, vec![Status::Ok, Status::WrongImageSize]);
    assert!(response.ids[0].is_some());
    assert_eq!(response.ids[1], None);
}

#[tokio::test]
async fn transfer_failures_map_to_statuses() {
    let dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(dir.path(), MemoryFetcher::default());

    let cases = [
        (TransferStatus::ExceedsServerLimit, Status::WrongImageSize),
        (TransferStatus::ExceedsFormLimit, Status::WrongImageSize),
        (TransferStatus::BlockedExtension, Status::WrongImageType),
        (TransferStatus::NoTempDir, Status::WrongImage),
        (TransferStatus::Partial, Status::CannotSave),
        (TransferStatus::NoFile, Status::CannotSave),
        (TransferStatus::CantWrite, Status::CannotSave),
    ];
    for (transfer, expected) in cases {
        let item = IngestionItem::Upload(UploadedFile::failed("x.png", transfer));
        assert_eq!(ingestor.ingest_one(item).await.status, expected);
    }
}

#[tokio::test]
async fn all_failures_reject_with_populated_arrays() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MemoryFetcher::default().with("https://img.test/page", HTML);
    let ingestor = ingestor(dir.path(), fetcher);

    let items = parse_json_items(
        br#"["https://img.test/page", "not a url", "https://img.test/missing.png"]"#,
    )
    .unwrap();
    let report = ingestor.ingest_batch(items).await.unwrap();

    assert_eq!(report.status, BatchStatus::Reject);
    let response = report.response();
    assert_eq!(
        response.result,
        vec![Status::WrongImageType, Status::WrongImage, Status::WrongImage]
    );
    assert_eq!(response.ids, vec![None, None, None]);
}

#[tokio::test]
async fn malformed_submissions_are_rejected_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(dir.path(), MemoryFetcher::default());

    assert_eq!(parse_json_items(b"[]").unwrap_err(), Rejection::Malformed);
    assert_eq!(
        parse_json_items(br#"{"url": "https://img.test/cat.png"}"#).unwrap_err(),
        Rejection::Malformed
    );
    assert_eq!(
        ingestor.ingest_batch(Vec::new()).await.unwrap_err(),
        Rejection::Malformed
    );
}

#[tokio::test]
async fn oversized_sources_are_wrong_image_size() {
    let dir = tempfile::tempdir().unwrap();
    let mut big = PNG.to_vec();
    big.resize(2 * 1024 * 1024, 0);

    let mut config = config_for(dir.path());
    config.limits.max_file_size_mb = 1;
    let fetcher = MemoryFetcher::default().with("https://img.test/big.png", &big);
    let ingestor = Ingestor::new(&config, Arc::new(fetcher));

    let items = vec![
        IngestionItem::from_text("https://img.test/big.png"),
        IngestionItem::from_text(data_uri("image/png", &big)),
        upload("big.png", &big),
    ];
    let report = ingestor.ingest_batch(items).await.unwrap();

    assert_eq!(report.status, BatchStatus::Reject);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.status == Status::WrongImageSize));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingestions_get_distinct_names() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MemoryFetcher::default().with("https://img.test/cat.png", PNG);
    let ingestor = Arc::new(ingestor(dir.path(), fetcher));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let ingestor = Arc::clone(&ingestor);
            tokio::spawn(async move {
                let item = if i % 2 == 0 {
                    IngestionItem::from_text("https://img.test/cat.png")
                } else {
                    upload("cat.png", PNG)
                };
                ingestor.ingest_one(item).await
            })
        })
        .collect();

    let mut names = HashSet::new();
    for task in tasks {
        let outcome = task.await.unwrap();
        assert_eq!(outcome.status, Status::Ok);
        assert!(names.insert(outcome.stored_id.unwrap()));
    }
    assert_eq!(names.len(), 32);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 32);
}

#[tokio::test]
async fn parallel_batch_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());
    config.processing.parallel_items = 3;
    let fetcher = MemoryFetcher::default()
        .with("https://img.test/a.png", PNG)
        .with("https://img.test/b.html", HTML);
    let ingestor = Ingestor::new(&config, Arc::new(fetcher));

    let items = vec![
        IngestionItem::from_text("https://img.test/b.html"),
        IngestionItem::from_text("https://img.test/a.png"),
        IngestionItem::from_text("bogus"),
        upload("c.jpg", JPEG),
    ];
    let report = ingestor.ingest_batch(items).await.unwrap();
    let response = report.response();

    assert_eq!(
        response.result,
        vec![
            Status::WrongImageType,
            Status::Ok,
            Status::WrongImage,
            Status::Ok
        ]
    );
    assert!(response.ids[1].as_ref().unwrap().ends_with(".png"));
    assert!(response.ids[3].as_ref().unwrap().ends_with(".jpg"));
}

#[tokio::test]
async fn no_temporary_objects_remain() {
    let images = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();

    let mut config = config_for(images.path());
    config.storage.temp_dir = Some(scratch.path().to_path_buf());
    let fetcher = MemoryFetcher::default()
        .with("https://img.test/a.png", PNG)
        .with("https://img.test/b.html", HTML);
    let ingestor = Ingestor::new(&config, Arc::new(fetcher));

    let spooled = ingestor.temp_store().write_bytes(HTML).unwrap();
    let items = vec![
        IngestionItem::from_text("https://img.test/a.png"),
        IngestionItem::from_text("https://img.test/b.html"),
        IngestionItem::from_text(data_uri("image/png", PNG)),
        IngestionItem::from_text(data_uri("text/plain", b"hello")),
        upload("a.png", PNG),
        IngestionItem::Upload(UploadedFile::new(
            "b.png",
            TransferStatus::Ok,
            UploadBody::Spooled(spooled),
        )),
    ];
    let report = ingestor.ingest_batch(items).await.unwrap();
    assert_eq!(report.stored_count(), 3);

    assert!(leftover_temporaries(images.path()).is_empty());
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn vanished_spool_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir(&images).unwrap();

    // The temp directory vanishes between spooling and committing
    let scratch = dir.path().join("scratch");
    std::fs::create_dir(&scratch).unwrap();
    let store = TempStore::new(&scratch);
    let spooled = store.write_bytes(PNG).unwrap();
    std::fs::remove_file(spooled.path()).unwrap();

    let ingestor = ingestor(&images, MemoryFetcher::default());
    let outcome = ingestor
        .ingest_one(IngestionItem::Upload(UploadedFile::new(
            "cat.png",
            TransferStatus::Ok,
            UploadBody::Spooled(spooled),
        )))
        .await;

    // Sniffing a vanished file finds no format
    assert_eq!(outcome.status, Status::WrongImageType);
    assert_eq!(std::fs::read_dir(&images).unwrap().count(), 0);
}

#[tokio::test]
async fn allocation_failure_cleans_separate_temp_dir() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();

    // No managed directory: every name reservation fails
    let mut config = config_for(&dir.path().join("missing"));
    config.storage.temp_dir = Some(scratch.path().to_path_buf());
    config.storage.max_allocation_attempts = 2;
    let fetcher = MemoryFetcher::default().with("https://img.test/a.png", PNG);
    let ingestor = Ingestor::new(&config, Arc::new(fetcher));

    let spooled = ingestor.temp_store().write_bytes(PNG).unwrap();
    let items = vec![
        IngestionItem::from_text("https://img.test/a.png"),
        IngestionItem::from_text(data_uri("image/png", PNG)),
        upload("a.png", PNG),
        IngestionItem::Upload(UploadedFile::new(
            "b.png",
            TransferStatus::Ok,
            UploadBody::Spooled(spooled),
        )),
    ];
    let report = ingestor.ingest_batch(items).await.unwrap();

    assert_eq!(report.status, BatchStatus::Reject);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.status == Status::CannotSave && o.stored_id.is_none()));
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn wrapped_and_unpadded_data_uris_are_stored() {
    let dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(dir.path(), MemoryFetcher::default());

    let encoded = base64::engine::general_purpose::STANDARD.encode(PNG);
    let wrapped = format!("data:image/png;base64,{}\n{}", &encoded[..16], &encoded[16..]);

    let jpeg = base64::engine::general_purpose::STANDARD.encode(JPEG);
    assert!(jpeg.ends_with('='));
    let unpadded = format!("data:image/jpeg;base64,{}", jpeg.trim_end_matches('='));

    let report = ingestor
        .ingest_batch(vec![
            IngestionItem::from_text(wrapped),
            IngestionItem::from_text(unpadded),
        ])
        .await
        .unwrap();
    let response = report.response();

    assert_eq!(response.result, vec![Status::Ok, Status::Ok]);
    let png_id = response.ids[0].clone().unwrap();
    let jpeg_id = response.ids[1].clone().unwrap();
    assert!(png_id.ends_with(".png"));
    assert!(jpeg_id.ends_with(".jpg"));
    assert_eq!(std::fs::read(dir.path().join(png_id)).unwrap(), PNG);
    assert_eq!(std::fs::read(dir.path().join(jpeg_id)).unwrap(), JPEG);
}

#[tokio::test]
async fn interrupted_spools_are_hidden_and_distinct_from_stored_names() {
    let dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(dir.path(), MemoryFetcher::default());

    // A process dying mid-spool leaves its temporary file behind
    let orphan = ingestor.temp_store().write_bytes(PNG).unwrap();
    let orphan_path = orphan.path().to_path_buf();
    std::mem::forget(orphan);

    let outcome = ingestor.ingest_one(upload("cat.png", PNG)).await;
    let stored = outcome.stored_id.unwrap();

    let orphan_name = orphan_path.file_name().unwrap().to_string_lossy().into_owned();
    let leftovers = leftover_temporaries(dir.path());
    assert_eq!(leftovers.len(), 1);
    assert!(leftovers[0].ends_with(&orphan_name));
    assert!(orphan_name.starts_with('.'));
    assert!(!stored.starts_with('.'));
    assert!(!TempStore::is_temporary_name(&dir.path().join(&stored)));
}
