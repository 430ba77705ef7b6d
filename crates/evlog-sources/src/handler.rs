//! Source handler trait

use std::path::PathBuf;

use async_trait::async_trait;
use evlog_core::{LogEntry, Result};

use crate::raw::RawRecord;

/// One parsed line from a source file.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecord {
    Structured(LogEntry),
    Raw(RawRecord),
}

/// Trait for the different kinds of log files the ingestor reads
#[async_trait]
pub trait SourceHandler: Send + Sync {
    /// Short label used in reports and diagnostics
    fn name(&self) -> &str;

    /// Files this source currently covers, sorted
    async fn discover(&self) -> Result<Vec<PathBuf>>;

    /// Parse one complete line. `None` means the line is malformed and
    /// should be skipped.
    fn parse_line(&self, line: &str) -> Option<SourceRecord>;
}
