//! Incremental file → store ingest
//!
//! Each file's byte offset is stored next to the rows it produced and only
//! moves forward inside the same transaction as a batch, so an interrupted
//! run resumes from the last committed batch.

use std::path::Path;

use evlog_config::Config;
use evlog_core::LogLayout;
use evlog_sources::{JsonlSource, LineReader, RawSource, SourceHandler, SourceRecord, fingerprint};
use evlog_storage::{IndexedStore, IngestBatch, StructuredInsert};
use tracing::{debug, info, warn};

use crate::Result;

/// Totals for one ingest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_scanned: usize,
    pub rows_inserted: u64,
    pub lines_skipped: u64,
    /// Files re-read from offset 0 after shrinking or being replaced
    pub resets: usize,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.files_scanned += other.files_scanned;
        self.rows_inserted += other.rows_inserted;
        self.lines_skipped += other.lines_skipped;
        self.resets += other.resets;
    }
}

pub struct Ingestor<'a> {
    store: &'a IndexedStore,
    sources: Vec<Box<dyn SourceHandler>>,
    batch_size: usize,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a IndexedStore, batch_size: usize) -> Self {
        Self {
            store,
            sources: Vec::new(),
            batch_size: batch_size.max(1),
        }
    }

    /// JSONL streams under `log_dir` plus every configured raw source.
    pub fn from_config(store: &'a IndexedStore, config: &Config) -> Result<Self> {
        let mut ingestor = Self::new(store, config.ingest.batch_size)
            .with_source(Box::new(JsonlSource::new(LogLayout::new(&config.log_dir))));

        for raw in &config.raw_sources {
            ingestor = ingestor.with_source(Box::new(RawSource::from_config(raw)?));
        }
        Ok(ingestor)
    }

    pub fn with_source(mut self, source: Box<dyn SourceHandler>) -> Self {
        self.sources.push(source);
        self
    }

    pub async fn ingest(&self) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for source in &self.sources {
            let files = source.discover().await?;
            debug!("Source {} has {} files", source.name(), files.len());

            for path in files {
                report.merge(self.ingest_file(&**source, &path).await?);
            }
        }

        info!(
            "Ingested {} rows from {} files ({} lines skipped, {} resets)",
            report.rows_inserted, report.files_scanned, report.lines_skipped, report.resets
        );
        Ok(report)
    }

    /// Ingest whatever complete lines `path` gained since the last run.
    pub async fn ingest_file(&self, source: &dyn SourceHandler, path: &Path) -> Result<IngestReport> {
        let key = path.to_string_lossy();
        let mut report = IngestReport {
            files_scanned: 1,
            ..Default::default()
        };

        // 1. Compare the file against its recorded offset
        let size = tokio::fs::metadata(path).await?.len();
        let state = self.store.ingest_state(&key).await?;
        let mut offset = state.as_ref().map(|s| s.offset()).unwrap_or(0);

        let reset = if offset > size {
            true
        } else if offset > 0
            && let Some(expected) = state.as_ref().and_then(|s| s.fingerprint.as_deref())
        {
            fingerprint(path, offset).await? != expected
        } else {
            false
        };

        if reset {
            warn!("{} was truncated or replaced, re-reading from the start", key);
            offset = 0;
            report.resets = 1;
        }

        // 2. Read complete lines in batches, committing each with its offset
        let mut reader = LineReader::open(path, offset, size).await?;
        let mut committed = false;

        loop {
            let lines = reader.next_batch(self.batch_size).await?;
            let exhausted = lines.len() < self.batch_size;
            if lines.is_empty() && (committed || !reset) {
                break;
            }

            let mut batch = IngestBatch::default();
            for line in lines {
                match source.parse_line(&line) {
                    Some(SourceRecord::Structured(entry)) => {
                        batch.structured.push(StructuredInsert::from_line(entry, &line));
                    }
                    Some(SourceRecord::Raw(record)) => batch.raw.push(record),
                    None => {
                        debug!("Skipping malformed line in {}", key);
                        report.lines_skipped += 1;
                    }
                }
            }

            let new_offset = reader.offset();
            let head = if new_offset > 0 {
                Some(fingerprint(path, new_offset).await?)
            } else {
                None
            };

            report.rows_inserted += self
                .store
                .ingest_batch(&key, &batch, new_offset, head.as_deref())
                .await?;
            committed = true;

            if exhausted {
                break;
            }
        }

        if report.lines_skipped > 0 {
            warn!("Skipped {} malformed lines in {}", report.lines_skipped, key);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evlog_core::{Level, LogEntry, QueryFilter};
    use evlog_sources::LinePattern;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn line(n: u32) -> String {
        let ts = datetime!(2026-02-26 12:00:00 UTC) + time::Duration::seconds(i64::from(n));
        let entry = LogEntry::new(ts, "job.run", Level::Info).with_data(json!({"n": n}));
        format!("{}\n", serde_json::to_string(&entry).unwrap())
    }

    async fn setup() -> (TempDir, IndexedStore) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("logs")).unwrap();
        let store = IndexedStore::open(&dir.path().join("logs.db")).await.unwrap();
        (dir, store)
    }

    fn jsonl(dir: &TempDir) -> Box<dyn SourceHandler> {
        Box::new(JsonlSource::new(LogLayout::new(dir.path().join("logs"))))
    }

    #[tokio::test]
    async fn test_ingest_is_incremental() {
        let (dir, store) = setup().await;
        let path = dir.path().join("logs").join("job.run.jsonl");
        std::fs::write(&path, (0..3).map(line).collect::<String>()).unwrap();

        let ingestor = Ingestor::new(&store, 2).with_source(jsonl(&dir));
        assert_eq!(ingestor.ingest().await.unwrap().rows_inserted, 3);
        assert_eq!(ingestor.ingest().await.unwrap().rows_inserted, 0);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(line(3).as_bytes()).unwrap();
        assert_eq!(ingestor.ingest().await.unwrap().rows_inserted, 1);
        assert_eq!(store.count(&QueryFilter::new()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_partial_line_waits_for_newline() {
        let (dir, store) = setup().await;
        let path = dir.path().join("logs").join("job.run.jsonl");
        let next = line(1);
        let (head, tail) = next.split_at(20);
        std::fs::write(&path, format!("{}{}", line(0), head)).unwrap();

        let ingestor = Ingestor::new(&store, 100).with_source(jsonl(&dir));
        assert_eq!(ingestor.ingest().await.unwrap().rows_inserted, 1);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(tail.as_bytes()).unwrap();
        let report = ingestor.ingest().await.unwrap();
        assert_eq!(report.rows_inserted, 1);
        assert_eq!(report.lines_skipped, 0);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let (dir, store) = setup().await;
        let path = dir.path().join("logs").join("job.run.jsonl");
        std::fs::write(&path, format!("{}not json\n{}", line(0), line(1))).unwrap();

        let report = Ingestor::new(&store, 100)
            .with_source(jsonl(&dir))
            .ingest()
            .await
            .unwrap();
        assert_eq!(report.rows_inserted, 2);
        assert_eq!(report.lines_skipped, 1);
    }

    #[tokio::test]
    async fn test_shrunk_file_is_reread() {
        let (dir, store) = setup().await;
        let path = dir.path().join("logs").join("job.run.jsonl");
        std::fs::write(&path, (0..5).map(line).collect::<String>()).unwrap();

        let ingestor = Ingestor::new(&store, 100).with_source(jsonl(&dir));
        ingestor.ingest().await.unwrap();

        std::fs::write(&path, line(10)).unwrap();
        let report = ingestor.ingest().await.unwrap();
        assert_eq!(report.resets, 1);
        assert_eq!(report.rows_inserted, 1);

        let key = path.to_string_lossy();
        let state = store.ingest_state(&key).await.unwrap().unwrap();
        assert_eq!(state.offset(), line(10).len() as u64);
    }

    #[tokio::test]
    async fn test_replaced_file_detected_by_fingerprint() {
        let (dir, store) = setup().await;
        let path = dir.path().join("logs").join("job.run.jsonl");
        std::fs::write(&path, line(0)).unwrap();

        let ingestor = Ingestor::new(&store, 100).with_source(jsonl(&dir));
        ingestor.ingest().await.unwrap();

        // same size or larger, different head
        std::fs::write(&path, (20..23).map(line).collect::<String>()).unwrap();
        let report = ingestor.ingest().await.unwrap();
        assert_eq!(report.resets, 1);
        assert_eq!(report.rows_inserted, 3);
    }

    #[tokio::test]
    async fn test_unified_stream_not_ingested() {
        let (dir, store) = setup().await;
        let logs = dir.path().join("logs");
        std::fs::write(logs.join("job.run.jsonl"), line(0)).unwrap();
        std::fs::write(logs.join("all.jsonl"), line(0)).unwrap();

        let report = Ingestor::new(&store, 100)
            .with_source(jsonl(&dir))
            .ingest()
            .await
            .unwrap();
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.rows_inserted, 1);
    }

    #[tokio::test]
    async fn test_raw_source() {
        let (dir, store) = setup().await;
        let raw_dir = dir.path().join("raw");
        std::fs::create_dir_all(&raw_dir).unwrap();
        std::fs::write(
            raw_dir.join("gw.log"),
            "[2026-02-26 12:00:00] ERROR: upstream timeout\nbare line\n",
        )
        .unwrap();

        let source = RawSource::new(
            "gateway",
            format!("{}/*.log", raw_dir.display()),
            LinePattern::default(),
        );
        let ingestor = Ingestor::new(&store, 100).with_source(Box::new(source));
        assert_eq!(ingestor.ingest().await.unwrap().rows_inserted, 2);
        assert_eq!(ingestor.ingest().await.unwrap().rows_inserted, 0);

        let rows = store.raw_logs(Some("gateway"), 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].raw_line.as_deref(), Some("bare line"));
        assert_eq!(rows[0].level, None);
        assert_eq!(rows[1].level.as_deref(), Some("error"));
        assert_eq!(rows[1].ts.as_deref(), Some("2026-02-26T12:00:00.000Z"));
    }
}
