use std::path::PathBuf;

use evlog_core::layout::validate_event_name;
use evlog_core::{LogEntry, LogLayout, QueryFilter};
use evlog_sources::LineReader;
use evlog_storage::IndexedStore;

use crate::Result;

/// Where a query reads from
#[derive(Clone, Copy)]
pub enum QuerySource<'a> {
    /// Scan `<event>.jsonl`, or `all.jsonl` without an event filter
    Files,
    Store(&'a IndexedStore),
}

pub struct QueryViewer {
    layout: LogLayout,
}

impl QueryViewer {
    pub fn new(layout: LogLayout) -> Self {
        Self { layout }
    }

    /// Matching entries, newest first, cut to `filter.limit`.
    pub async fn query(&self, filter: &QueryFilter, source: QuerySource<'_>) -> Result<Vec<LogEntry>> {
        match source {
            QuerySource::Store(store) => Ok(store.query(filter).await?),
            QuerySource::Files => {
                let mut entries = self.scan(filter).await?;
                // file order is oldest first; keep that tie-break reversed
                entries.reverse();
                entries.sort_by(|a, b| b.ts.cmp(&a.ts));
                if let Some(limit) = filter.limit {
                    entries.truncate(limit);
                }
                Ok(entries)
            }
        }
    }

    pub async fn count(&self, filter: &QueryFilter, source: QuerySource<'_>) -> Result<u64> {
        match source {
            QuerySource::Store(store) => Ok(store.count(filter).await?),
            QuerySource::Files => Ok(self.scan(filter).await?.len() as u64),
        }
    }

    /// File a query without a store reads.
    pub fn file_for(&self, filter: &QueryFilter) -> Result<PathBuf> {
        match &filter.event {
            Some(event) => {
                validate_event_name(event)?;
                Ok(self.layout.event_file(event))
            }
            None => Ok(self.layout.unified_file()),
        }
    }

    async fn scan(&self, filter: &QueryFilter) -> Result<Vec<LogEntry>> {
        let path = self.file_for(filter)?;
        let size = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = LineReader::open(&path, 0, size).await?;
        let mut matched = Vec::new();
        while let Some(line) = reader.next_line().await? {
            let Ok(entry) = serde_json::from_str::<LogEntry>(&line) else {
                continue;
            };
            if filter.matches(&entry, &line) {
                matched.push(entry);
            }
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evlog_core::Level;
    use serde_json::json;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn write_entries(path: &std::path::Path, entries: &[LogEntry]) {
        let content: String = entries
            .iter()
            .map(|e| format!("{}\n", serde_json::to_string(e).unwrap()))
            .collect();
        std::fs::write(path, content).unwrap();
    }

    fn entry(minute: i64, event: &str, level: Level) -> LogEntry {
        LogEntry::new(
            datetime!(2026-02-26 12:00 UTC) + time::Duration::minutes(minute),
            event,
            level,
        )
        .with_data(json!({"minute": minute}))
    }

    #[tokio::test]
    async fn test_file_query_orders_newest_first() {
        let dir = TempDir::new().unwrap();
        let layout = LogLayout::new(dir.path());
        write_entries(
            &layout.unified_file(),
            &[
                entry(0, "a", Level::Info),
                entry(2, "b", Level::Error),
                entry(1, "a", Level::Warn),
            ],
        );
        std::fs::OpenOptions::new()
            .append(true)
            .open(layout.unified_file())
            .and_then(|mut f| std::io::Write::write_all(&mut f, b"garbage\n"))
            .unwrap();

        let viewer = QueryViewer::new(layout);
        let all = viewer.query(&QueryFilter::new(), QuerySource::Files).await.unwrap();
        assert_eq!(
            all.iter().map(|e| e.data["minute"].as_i64().unwrap()).collect::<Vec<_>>(),
            vec![2, 1, 0]
        );

        let limited = viewer
            .query(&QueryFilter::new().with_limit(1), QuerySource::Files)
            .await
            .unwrap();
        assert_eq!(limited[0].event, "b");

        let errors = QueryFilter::new().with_level(Level::Error);
        assert_eq!(viewer.count(&errors, QuerySource::Files).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_event_filter_reads_event_file() {
        let dir = TempDir::new().unwrap();
        let layout = LogLayout::new(dir.path());
        write_entries(&layout.event_file("a"), &[entry(0, "a", Level::Info)]);

        let viewer = QueryViewer::new(layout);
        let found = viewer
            .query(&QueryFilter::new().with_event("a"), QuerySource::Files)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let missing = viewer
            .query(&QueryFilter::new().with_event("nope"), QuerySource::Files)
            .await
            .unwrap();
        assert!(missing.is_empty());

        assert!(
            viewer
                .query(&QueryFilter::new().with_event("../a"), QuerySource::Files)
                .await
                .is_err()
        );
    }
}
