//! Pipeline lifecycle integration tests.
//!
//! These tests drive discovered entries through the full state machine with a
//! scripted transport and on-disk SQLite stores:
//! - First sighting: row created, enclosure downloaded, new status registered
//! - Re-delivery: pending items resume, terminal items are skipped untouched
//! - Failures: contained to the item, row keeps its previous status

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use feedpipe_core::{
    build_request_url,
    testing::{fixtures, MockTransport},
    DiscoveredEntry, Downloader, EnrichmentClient, EnrichmentError, IngestPipeline, ItemLedger,
    ItemOutcome, LedgerError, LedgerItem, PipelineConfig, PipelineError, RssFeedSource,
    SqliteItemLedger, SqliteStatusStore, Stage, StatusCatalog, StatusId, StatusStore,
    StorageConfig, UpdateOutcome,
};

const ADDRESS: &str = "http://x/a.mp3";
const ENCLOSURE: &[u8] = b"ID3\x03\x00 fake mpeg frames";

/// Ledger wrapper counting every write that reaches the store.
struct CountingLedger {
    inner: SqliteItemLedger,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl CountingLedger {
    fn writes(&self) -> usize {
        self.creates.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }
}

impl ItemLedger for CountingLedger {
    fn find(&self, address: &str) -> Result<Option<LedgerItem>, LedgerError> {
        self.inner.find(address)
    }

    fn create(&self, entry: &DiscoveredEntry, status: StatusId) -> Result<LedgerItem, LedgerError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(entry, status)
    }

    fn update_payload_and_status(
        &self,
        address: &str,
        payload: &str,
        status: StatusId,
    ) -> Result<UpdateOutcome, LedgerError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_payload_and_status(address, payload, status)
    }
}

/// Test helper wiring the pipeline to mocks and temp-dir stores.
struct TestHarness {
    pipeline: IngestPipeline,
    transport: MockTransport,
    catalog: Arc<StatusCatalog>,
    status_store: Arc<SqliteStatusStore>,
    ledger: Arc<CountingLedger>,
    storage_root: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_pipeline_config(PipelineConfig::default())
    }

    fn with_pipeline_config(pipeline_config: PipelineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let storage_root = temp_dir.path().join("enclosures");

        let status_store =
            Arc::new(SqliteStatusStore::new(&db_path).expect("Failed to create status store"));
        let catalog = Arc::new(
            StatusCatalog::load(status_store.clone()).expect("Failed to load status catalog"),
        );
        let ledger = Arc::new(CountingLedger {
            inner: SqliteItemLedger::new(&db_path).expect("Failed to create ledger"),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        });
        let transport = MockTransport::new();

        let downloader = Downloader::new(
            Arc::new(transport.clone()),
            &StorageConfig {
                root: storage_root.clone(),
                save_to_disk: true,
            },
        );
        let enrichment = EnrichmentClient::new(
            Arc::new(transport.clone()),
            fixtures::enrichment_config(),
            Arc::clone(&catalog),
            ledger.clone(),
        );
        let pipeline = IngestPipeline::new(
            &pipeline_config,
            Arc::clone(&catalog),
            ledger.clone(),
            downloader,
            enrichment,
        )
        .expect("Failed to create pipeline");

        Self {
            pipeline,
            transport,
            catalog,
            status_store,
            ledger,
            storage_root,
            _temp_dir: temp_dir,
        }
    }

    fn enrichment_url(address: &str) -> String {
        build_request_url(&fixtures::enrichment_config(), address).unwrap()
    }

    async fn serve_enclosure(&self, address: &str) {
        self.transport.respond(address, 200, ENCLOSURE.to_vec()).await;
    }

    async fn serve_status(&self, address: &str, json: &str) {
        self.transport
            .respond_json(&Self::enrichment_url(address), json)
            .await;
    }

    fn item(&self, address: &str) -> LedgerItem {
        self.ledger
            .find(address)
            .unwrap()
            .expect("ledger row should exist")
    }

    fn status_rows(&self, label: &str) -> usize {
        self.status_store
            .load_all()
            .unwrap()
            .into_iter()
            .filter(|s| s.label == label)
            .count()
    }
}

#[tokio::test]
async fn test_first_sighting_registers_unseen_status() {
    let h = TestHarness::new();
    h.serve_enclosure(ADDRESS).await;
    h.serve_status(ADDRESS, r#"{"status":"processing"}"#).await;

    let report = h.pipeline.process_entry(&fixtures::entry(ADDRESS, "g1")).await;

    assert!(report.created);
    let processing = h.catalog.resolve("processing").expect("status registered");
    assert!(matches!(report.outcome, ItemOutcome::Pending { status } if status == processing));
    assert!(h.catalog.is_pending(processing).unwrap());
    assert_eq!(h.status_rows("processing"), 1);

    let item = h.item(ADDRESS);
    assert_eq!(item.status, processing);
    assert_eq!(item.payload, r#"{"status":"processing"}"#);
    assert_eq!(item.filename, "g1.mp3");
    assert_eq!(std::fs::read(h.storage_root.join("g1.mp3")).unwrap(), ENCLOSURE);
}

#[tokio::test]
async fn test_new_row_starts_in_initial_status() {
    let h = TestHarness::new();
    h.serve_enclosure(ADDRESS).await;
    h.transport
        .respond(&TestHarness::enrichment_url(ADDRESS), 502, b"bad gateway".to_vec())
        .await;

    let report = h.pipeline.process_entry(&fixtures::entry(ADDRESS, "g1")).await;

    assert!(report.created);
    assert!(matches!(
        report.outcome,
        ItemOutcome::Failed {
            stage: Stage::Enrichment,
            error: PipelineError::Enrichment(EnrichmentError::RequestFailed(_))
        }
    ));
    let item = h.item(ADDRESS);
    assert_eq!(item.status, h.pipeline.initial_status());
    assert_eq!(h.catalog.resolve("entered"), Some(item.status));
}

#[tokio::test]
async fn test_resubmission_reaches_terminal_then_becomes_noop() {
    let h = TestHarness::new();
    let done = h.catalog.ensure("done", false).unwrap();
    let entry = fixtures::entry(ADDRESS, "g1");
    h.serve_enclosure(ADDRESS).await;

    h.serve_status(ADDRESS, r#"{"status":"processing"}"#).await;
    let first = h.pipeline.process_entry(&entry).await;
    assert!(matches!(first.outcome, ItemOutcome::Pending { .. }));

    h.serve_status(ADDRESS, r#"{"status":"done","topics":["news"]}"#).await;
    let second = h.pipeline.process_entry(&entry).await;
    assert!(!second.created);
    assert!(matches!(second.outcome, ItemOutcome::Terminal { status } if status == done));
    assert_eq!(h.item(ADDRESS).status, done);
    // File already on disk: the enclosure was fetched only once.
    assert_eq!(h.transport.request_count(ADDRESS).await, 1);

    let writes_before = h.ledger.writes();
    let updated_before = h.item(ADDRESS).updated_at;
    h.transport.clear_requests().await;

    let third = h.pipeline.process_entry(&entry).await;

    assert!(matches!(third.outcome, ItemOutcome::AlreadyTerminal { status } if status == done));
    assert!(h.transport.requests().await.is_empty());
    assert_eq!(h.ledger.writes(), writes_before);
    assert_eq!(h.item(ADDRESS).updated_at, updated_before);
}

#[tokio::test]
async fn test_malformed_response_leaves_status_unchanged() {
    let h = TestHarness::new();
    h.serve_enclosure(ADDRESS).await;
    h.transport
        .respond(
            &TestHarness::enrichment_url(ADDRESS),
            200,
            b"<html>maintenance</html>".to_vec(),
        )
        .await;

    let report = h.pipeline.process_entry(&fixtures::entry(ADDRESS, "g1")).await;

    assert!(matches!(
        report.outcome,
        ItemOutcome::Failed {
            stage: Stage::Enrichment,
            error: PipelineError::Enrichment(EnrichmentError::MalformedResponse { .. })
        }
    ));
    let item = h.item(ADDRESS);
    assert_eq!(item.status, h.pipeline.initial_status());
    assert!(item.payload.is_empty());
    assert_eq!(h.ledger.updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_zero_byte_file_is_downloaded_again() {
    let h = TestHarness::new();
    std::fs::create_dir_all(&h.storage_root).unwrap();
    std::fs::write(h.storage_root.join("g1.mp3"), b"").unwrap();
    h.serve_enclosure(ADDRESS).await;
    h.serve_status(ADDRESS, r#"{"status":"processing"}"#).await;

    h.pipeline.process_entry(&fixtures::entry(ADDRESS, "g1")).await;

    assert_eq!(h.transport.request_count(ADDRESS).await, 1);
    assert_eq!(std::fs::read(h.storage_root.join("g1.mp3")).unwrap(), ENCLOSURE);
}

#[tokio::test]
async fn test_download_failure_is_retried_on_next_pass() {
    let h = TestHarness::new();
    let entry = fixtures::entry(ADDRESS, "g1");
    h.transport.fail(ADDRESS, "connection reset").await;
    h.serve_status(ADDRESS, r#"{"status":"processing"}"#).await;

    let first = h.pipeline.process_entry(&entry).await;

    assert!(matches!(
        first.outcome,
        ItemOutcome::Failed {
            stage: Stage::Download,
            ..
        }
    ));
    assert_eq!(h.item(ADDRESS).status, h.pipeline.initial_status());
    assert!(h
        .transport
        .requests_with_prefix("http://api.example.com")
        .await
        .is_empty());

    h.serve_enclosure(ADDRESS).await;
    let second = h.pipeline.process_entry(&entry).await;

    assert!(!second.created);
    assert!(matches!(second.outcome, ItemOutcome::Pending { .. }));
    assert_eq!(h.ledger.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_item_does_not_abort_batch() {
    let h = TestHarness::new();
    let ok_address = "http://x/ok.mp3";
    let bad_address = "http://x/bad.mp3";
    h.serve_enclosure(ok_address).await;
    h.serve_enclosure(bad_address).await;
    h.serve_status(ok_address, r#"{"status":"processing"}"#).await;
    h.serve_status(bad_address, r#"{"status": 7}"#).await;

    let summary = h
        .pipeline
        .process_batch(vec![
            fixtures::entry(bad_address, "bad"),
            fixtures::entry(ok_address, "ok"),
        ])
        .await;

    assert_eq!(summary.seen, 2);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.pending, 1);
}

#[tokio::test]
async fn test_guids_sanitizing_alike_get_separate_files() {
    let h = TestHarness::new();
    let query_address = "http://x/a?b";
    let path_address = "http://x/a/b";
    h.transport.respond(query_address, 200, b"query body".to_vec()).await;
    h.transport.respond(path_address, 200, b"path body".to_vec()).await;
    h.serve_status(query_address, r#"{"status":"processing"}"#).await;
    h.serve_status(path_address, r#"{"status":"processing"}"#).await;

    let summary = h
        .pipeline
        .process_batch(vec![
            fixtures::entry(query_address, query_address),
            fixtures::entry(path_address, path_address),
        ])
        .await;

    assert_eq!(summary.pending, 2);
    let query_item = h.item(query_address);
    let path_item = h.item(path_address);
    assert_ne!(query_item.filename, path_item.filename);
    assert_eq!(
        std::fs::read(h.storage_root.join(&query_item.filename)).unwrap(),
        b"query body"
    );
    assert_eq!(
        std::fs::read(h.storage_root.join(&path_item.filename)).unwrap(),
        b"path body"
    );
    assert_eq!(h.transport.request_count(path_address).await, 1);
}

#[tokio::test]
async fn test_duplicate_address_in_batch_processed_once() {
    let h = TestHarness::with_pipeline_config(PipelineConfig {
        max_concurrent_items: 4,
        ..Default::default()
    });
    h.serve_enclosure(ADDRESS).await;
    h.serve_status(ADDRESS, r#"{"status":"processing"}"#).await;
    let entry = fixtures::entry(ADDRESS, "g1");

    let summary = h
        .pipeline
        .process_batch(vec![entry.clone(), entry.clone(), entry])
        .await;

    assert_eq!(summary.seen, 1);
    assert_eq!(h.ledger.creates.load(Ordering::SeqCst), 1);
    assert_eq!(h.transport.request_count(ADDRESS).await, 1);
}

#[tokio::test]
async fn test_concurrent_items_share_new_status() {
    let h = TestHarness::with_pipeline_config(PipelineConfig {
        max_concurrent_items: 4,
        ..Default::default()
    });
    let addresses: Vec<String> = (0..6).map(|i| format!("http://x/{}.mp3", i)).collect();
    for address in &addresses {
        h.serve_enclosure(address).await;
        h.serve_status(address, r#"{"status":"transcribing"}"#).await;
    }

    let entries = addresses
        .iter()
        .enumerate()
        .map(|(i, a)| fixtures::entry(a, &format!("g{}", i)))
        .collect();
    let summary = h.pipeline.process_batch(entries).await;

    assert_eq!(summary.pending, 6);
    assert_eq!(h.status_rows("transcribing"), 1);
    let id = h.catalog.resolve("transcribing").unwrap();
    for address in &addresses {
        assert_eq!(h.item(address).status, id);
    }
}

#[tokio::test]
async fn test_row_with_unknown_status_is_reported() {
    let h = TestHarness::new();
    h.ledger
        .create(&fixtures::entry(ADDRESS, "g1"), 9_999)
        .unwrap();
    h.serve_enclosure(ADDRESS).await;

    let report = h.pipeline.process_entry(&fixtures::entry(ADDRESS, "g1")).await;

    assert!(matches!(
        report.outcome,
        ItemOutcome::Failed {
            stage: Stage::Lookup,
            ..
        }
    ));
    assert!(h.transport.requests().await.is_empty());
}

#[tokio::test]
async fn test_run_once_polls_feed() {
    let h = TestHarness::new();
    h.transport
        .respond(fixtures::FEED_URL, 200, fixtures::SAMPLE_FEED.as_bytes().to_vec())
        .await;
    let batch = feedpipe_core::parse_feed(fixtures::SAMPLE_FEED).unwrap();
    for entry in &batch.entries {
        h.serve_enclosure(&entry.address).await;
        h.serve_status(&entry.address, r#"{"status":"queued"}"#).await;
    }
    let source = RssFeedSource::new(fixtures::FEED_URL, Arc::new(h.transport.clone()));

    let summary = h.pipeline.run_once(&source).await.unwrap();

    assert_eq!(summary.seen, 2);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.pending, 2);
    assert!(h
        .storage_root
        .join("7c69a3cd6f79894e7f4bd5d808477d8e.mp3")
        .exists());

    let again = h.pipeline.run_once(&source).await.unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.pending, 2);
}
