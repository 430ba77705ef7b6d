//! Directory layout of a log directory
//!
//! ```text
//! <root>/<event>.jsonl                       per-event stream
//! <root>/all.jsonl                           unified stream
//! <root>/archive/<YYYY-MM>/<event>.<date>.jsonl[.zst]
//! <root>/archive/logs-<YYYY-MM>.db           archived store rows
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const UNIFIED_FILE_NAME: &str = "all.jsonl";
pub const LOG_EXTENSION: &str = "jsonl";
pub const ARCHIVE_DIR_NAME: &str = "archive";
pub const COMPRESSED_EXTENSION: &str = "zst";

/// Event name that would collide with the unified stream.
pub const RESERVED_EVENT: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLayout {
    root: PathBuf,
}

impl LogLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn event_file(&self, event: &str) -> PathBuf {
        self.root.join(format!("{event}.{LOG_EXTENSION}"))
    }

    pub fn unified_file(&self) -> PathBuf {
        self.root.join(UNIFIED_FILE_NAME)
    }

    pub fn archive_root(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR_NAME)
    }

    pub fn month_bucket(&self, month: &str) -> PathBuf {
        self.archive_root().join(month)
    }

    pub fn archive_db(&self, month: &str) -> PathBuf {
        self.archive_root().join(format!("logs-{month}.db"))
    }

    pub fn is_unified(&self, path: &Path) -> bool {
        path.file_name().and_then(|n| n.to_str()) == Some(UNIFIED_FILE_NAME)
    }
}

/// Whether `path` names an active JSONL stream.
pub fn is_log_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(LOG_EXTENSION)
}

/// Event names become file names, so only `[A-Za-z0-9._-]` is allowed,
/// the name may not start with a dot, and `all` is reserved.
pub fn validate_event_name(event: &str) -> Result<()> {
    let valid_chars = event
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if event.is_empty() || !valid_chars || event.starts_with('.') || event == RESERVED_EVENT {
        return Err(Error::InvalidEventName(event.to_string()));
    }
    Ok(())
}

/// `YYYY-MM` with a month between 01 and 12.
pub fn is_month_key(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    if !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
        return false;
    }
    matches!(name[5..].parse::<u8>(), Ok(1..=12))
}
