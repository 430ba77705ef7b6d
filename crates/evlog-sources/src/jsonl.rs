use std::path::PathBuf;

use async_trait::async_trait;
use evlog_core::layout::is_log_file;
use evlog_core::{LogEntry, LogLayout, Result};

use crate::handler::{SourceHandler, SourceRecord};

/// The per-event `.jsonl` streams in a log directory.
///
/// `all.jsonl` mirrors every other stream, so it is never discovered.
pub struct JsonlSource {
    layout: LogLayout,
}

impl JsonlSource {
    pub fn new(layout: LogLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl SourceHandler for JsonlSource {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(self.layout.root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if is_log_file(&path) && !self.layout.is_unified(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn parse_line(&self, line: &str) -> Option<SourceRecord> {
        serde_json::from_str::<LogEntry>(line)
            .ok()
            .map(SourceRecord::Structured)
    }
}
