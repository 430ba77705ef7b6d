use std::path::PathBuf;

use async_trait::async_trait;
use evlog_config::RawSourceConfig;
use evlog_core::{Error, Result, timestamp};
use regex::Regex;
use tracing::warn;

use crate::handler::{SourceHandler, SourceRecord};

/// `[<ts>] <LEVEL>: <message>`
pub const DEFAULT_LINE_PATTERN: &str = r"^\[(?P<ts>[^\]]+)\]\s+(?P<level>\w+):\s*(?P<message>.*)$";

/// A line from a plain-text log. Lines the pattern does not match keep
/// only `source` and `raw_line`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub source: String,
    /// Canonical timestamp when the captured text parses, else the text as-is
    pub ts: Option<String>,
    pub level: Option<String>,
    pub message: Option<String>,
    pub raw_line: String,
}

/// Regex with optional `ts`, `level` and `message` named groups.
#[derive(Debug, Clone)]
pub struct LinePattern {
    regex: Regex,
}

impl LinePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex =
            Regex::new(pattern).map_err(|e| Error::InvalidPattern(format!("{pattern}: {e}")))?;
        Ok(Self { regex })
    }

    pub fn parse(&self, source: &str, line: &str) -> RawRecord {
        let mut record = RawRecord {
            source: source.to_string(),
            ts: None,
            level: None,
            message: None,
            raw_line: line.to_string(),
        };

        if let Some(caps) = self.regex.captures(line) {
            record.ts = caps.name("ts").map(|m| {
                let text = m.as_str().trim();
                timestamp::parse(text)
                    .map(timestamp::format)
                    .unwrap_or_else(|| text.to_string())
            });
            record.level = caps.name("level").map(|m| m.as_str().to_ascii_lowercase());
            record.message = caps.name("message").map(|m| m.as_str().to_string());
        }

        record
    }
}

impl Default for LinePattern {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_LINE_PATTERN).expect("default line pattern"),
        }
    }
}

/// Plain-text files matched by a glob.
pub struct RawSource {
    name: String,
    glob: String,
    pattern: LinePattern,
}

impl RawSource {
    pub fn new(name: impl Into<String>, glob: impl Into<String>, pattern: LinePattern) -> Self {
        Self {
            name: name.into(),
            glob: glob.into(),
            pattern,
        }
    }

    pub fn from_config(config: &RawSourceConfig) -> Result<Self> {
        let pattern = match &config.pattern {
            Some(pattern) => LinePattern::new(pattern)?,
            None => LinePattern::default(),
        };
        Ok(Self::new(&config.name, &config.glob, pattern))
    }
}

#[async_trait]
impl SourceHandler for RawSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn discover(&self) -> Result<Vec<PathBuf>> {
        let paths = glob::glob(&self.glob)
            .map_err(|e| Error::InvalidPattern(format!("{}: {e}", self.glob)))?;

        let mut files = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable path for source {}: {}", self.name, e),
            }
        }
        files.sort();
        Ok(files)
    }

    fn parse_line(&self, line: &str) -> Option<SourceRecord> {
        Some(SourceRecord::Raw(self.pattern.parse(&self.name, line)))
    }
}
