//! End-to-end: logger -> files -> ingest -> store, plus rotation and cleanup.

use std::path::Path;

use evlog_core::{Level, LogEntry, LogLayout, QueryFilter};
use evlog_engine::{Ingestor, QuerySource, QueryViewer, RotationManager};
use evlog_logger::EventLogger;
use evlog_sources::JsonlSource;
use evlog_storage::IndexedStore;
use serde_json::json;
use tempfile::TempDir;
use time::macros::datetime;

struct Harness {
    _dir: TempDir,
    layout: LogLayout,
    store: IndexedStore,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let layout = LogLayout::new(dir.path().join("logs"));
        let store = IndexedStore::open(&dir.path().join("logs.db")).await.unwrap();
        Self {
            _dir: dir,
            layout,
            store,
        }
    }

    fn ingestor(&self) -> Ingestor<'_> {
        Ingestor::new(&self.store, 500).with_source(Box::new(JsonlSource::new(self.layout.clone())))
    }
}

fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path).unwrap().lines().count()
}

#[tokio::test]
async fn test_logged_levels_reach_files_and_store() {
    let h = Harness::new().await;
    let logger = EventLogger::new(h.layout.root(), Level::Debug);

    assert!(logger.info("test.event", json!({"step": 1})).is_written());
    assert!(logger.warn("test.event", json!({"step": 2})).is_written());
    assert!(logger.error("test.event", json!({"step": 3})).is_written());
    logger.flush();

    assert_eq!(line_count(&h.layout.event_file("test.event")), 3);
    assert_eq!(line_count(&h.layout.unified_file()), 3);

    let errors = QueryFilter::new().with_level(Level::Error);
    let viewer = QueryViewer::new(h.layout.clone());
    assert_eq!(viewer.count(&errors, QuerySource::Files).await.unwrap(), 1);

    assert_eq!(h.ingestor().ingest().await.unwrap().rows_inserted, 3);
    let stored = viewer
        .query(&errors, QuerySource::Store(&h.store))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].data["step"], 3);
}

#[tokio::test]
async fn test_secrets_never_reach_the_store() {
    let h = Harness::new().await;
    let logger = EventLogger::new(h.layout.root(), Level::Info);
    logger.info(
        "auth.login",
        json!({"api_key": "sk_abcd1234567890123456789012", "user": "alice"}),
    );
    logger.flush();

    let raw = std::fs::read_to_string(h.layout.event_file("auth.login")).unwrap();
    assert!(!raw.contains("sk_abcd"));

    h.ingestor().ingest().await.unwrap();
    let stored = h
        .store
        .query(&QueryFilter::new().with_event("auth.login"))
        .await
        .unwrap();
    assert_eq!(stored[0].data["api_key"], "[REDACTED_KEY]");
    assert_eq!(stored[0].data["user"], "alice");
}

#[tokio::test]
async fn test_large_file_ingested_once() {
    let h = Harness::new().await;
    std::fs::create_dir_all(h.layout.root()).unwrap();

    let content: String = (0..2000)
        .map(|n| {
            let ts = datetime!(2026-02-26 00:00 UTC) + time::Duration::seconds(n);
            let entry = LogEntry::new(ts, "bulk", Level::Info).with_data(json!({"n": n}));
            format!("{}\n", serde_json::to_string(&entry).unwrap())
        })
        .collect();
    std::fs::write(h.layout.event_file("bulk"), content).unwrap();

    let ingestor = h.ingestor();
    assert_eq!(ingestor.ingest().await.unwrap().rows_inserted, 2000);
    assert_eq!(ingestor.ingest().await.unwrap().rows_inserted, 0);
    assert_eq!(h.store.count(&QueryFilter::new()).await.unwrap(), 2000);
}

#[tokio::test]
async fn test_repeated_payloads_are_all_stored() {
    let h = Harness::new().await;
    let logger = EventLogger::new(h.layout.root(), Level::Info);
    for _ in 0..2000 {
        logger.info("heartbeat", json!({"ok": true}));
    }
    logger.flush();

    let lines = line_count(&h.layout.event_file("heartbeat"));
    assert_eq!(lines, 2000);
    assert_eq!(h.ingestor().ingest().await.unwrap().rows_inserted, 2000);
    assert_eq!(h.store.count(&QueryFilter::new()).await.unwrap(), 2000);
}

#[tokio::test]
async fn test_rotation_then_reingest_adds_nothing() {
    let h = Harness::new().await;
    let logger = EventLogger::new(h.layout.root(), Level::Info);
    for n in 0..50 {
        logger.info("job.run", json!({"n": n}));
    }
    logger.flush();

    let ingestor = h.ingestor();
    assert_eq!(ingestor.ingest().await.unwrap().rows_inserted, 50);

    let manager = RotationManager::new(h.layout.clone(), 100, 10, true);
    let rotated = manager.rotate_all().await.unwrap();
    assert_eq!(rotated.len(), 2);
    assert!(rotated.iter().all(|r| r.kept_lines == 10));
    assert_eq!(line_count(&h.layout.event_file("job.run")), 10);

    let report = ingestor.ingest().await.unwrap();
    assert_eq!(report.resets, 1);
    assert_eq!(report.rows_inserted, 0);

    // writes after rotation go to the fresh file
    logger.info("job.run", json!({"n": 50}));
    logger.flush();
    assert_eq!(line_count(&h.layout.event_file("job.run")), 11);
    assert_eq!(ingestor.ingest().await.unwrap().rows_inserted, 1);
}

#[tokio::test]
async fn test_clean_keeps_recent_months() {
    let h = Harness::new().await;
    for month in ["2025-08", "2025-09", "2025-10", "2025-11"] {
        std::fs::create_dir_all(h.layout.month_bucket(month)).unwrap();
        std::fs::write(
            h.layout.month_bucket(month).join("job.run.jsonl"),
            "{}\n",
        )
        .unwrap();
    }

    let manager = RotationManager::new(h.layout.clone(), 1, 1, false);
    assert_eq!(
        manager.clean_old_archives(2).await.unwrap(),
        vec!["2025-08", "2025-09"]
    );
    assert!(h.layout.month_bucket("2025-10").exists());
    assert!(h.layout.month_bucket("2025-11").exists());
    assert!(!h.layout.month_bucket("2025-09").exists());
}
