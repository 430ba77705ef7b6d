use evlog_core::{Level, LogEntry, timestamp};
use evlog_sources::RawRecord;
use serde::Serialize;
use sqlx::FromRow;

use crate::{Result, StorageError};

/// A row of `structured_logs`
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StructuredRow {
    pub id: i64,
    pub ts: String,
    pub event: String,
    pub level: String,
    pub agent: Option<String>,
    pub source: Option<String>,
    pub session: Option<String>,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
    pub data_json: Option<String>,
    pub ingested_at: String,
    pub source_file: Option<String>,
    pub entry_hash: Option<String>,
}

impl StructuredRow {
    pub fn into_entry(self) -> Result<LogEntry> {
        let corrupt = |reason: String| StorageError::CorruptRow {
            id: self.id,
            reason,
        };

        let ts = timestamp::parse(&self.ts)
            .ok_or_else(|| corrupt(format!("invalid timestamp {:?}", self.ts)))?;
        let level: Level = self
            .level
            .parse()
            .map_err(|e: evlog_core::Error| corrupt(e.to_string()))?;
        let data = match self.data_json.as_deref() {
            Some(json) => serde_json::from_str(json)?,
            None => serde_json::Value::Null,
        };

        Ok(LogEntry {
            ts,
            event: self.event,
            level,
            agent: self.agent,
            source: self.source,
            session: self.session,
            duration_ms: self.duration_ms.and_then(|d| u64::try_from(d).ok()),
            error: self.error,
            data,
        })
    }
}

/// An entry on its way into `structured_logs`, keyed by the hash of the
/// exact line it was read from.
#[derive(Debug, Clone)]
pub struct StructuredInsert {
    pub entry: LogEntry,
    pub entry_hash: String,
}

impl StructuredInsert {
    pub fn from_line(entry: LogEntry, line: &str) -> Self {
        Self {
            entry,
            entry_hash: blake3::hash(line.trim().as_bytes()).to_hex().to_string(),
        }
    }
}

/// Lines read from one file in one pass, committed together with the
/// file's new offset.
#[derive(Debug, Clone, Default)]
pub struct IngestBatch {
    pub structured: Vec<StructuredInsert>,
    pub raw: Vec<RawRecord>,
}

impl IngestBatch {
    pub fn len(&self) -> usize {
        self.structured.len() + self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A row of `raw_logs`
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RawRow {
    pub id: i64,
    pub ts: Option<String>,
    pub source: String,
    pub level: Option<String>,
    pub message: Option<String>,
    pub raw_line: Option<String>,
    pub source_file: Option<String>,
    pub ingested_at: String,
}

/// Per-file ingest progress
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IngestState {
    pub file_path: String,
    pub last_byte_offset: i64,
    pub last_ingested_at: String,
    pub fingerprint: Option<String>,
}

impl IngestState {
    pub fn offset(&self) -> u64 {
        u64::try_from(self.last_byte_offset).unwrap_or(0)
    }
}
