use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;

/// Severity of a log entry, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            other => Err(Error::InvalidLevel(other.to_string())),
        }
    }
}

/// One structured record, serialized as a single JSONL line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(with = "crate::timestamp::serde_ts")]
    pub ts: OffsetDateTime,
    pub event: String,
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl LogEntry {
    pub fn new(ts: OffsetDateTime, event: impl Into<String>, level: Level) -> Self {
        Self {
            ts,
            event: event.into(),
            level,
            agent: None,
            source: None,
            session: None,
            duration_ms: None,
            error: None,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_meta(mut self, meta: EntryMeta) -> Self {
        self.agent = meta.agent;
        self.source = meta.source;
        self.session = meta.session;
        self.duration_ms = meta.duration_ms;
        self.error = meta.error;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Short human-readable summary: `data.message` when present,
    /// otherwise the compact JSON of `data` cut to 80 characters.
    pub fn summary(&self) -> String {
        if let Some(message) = self.data.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
        let compact = match &self.data {
            serde_json::Value::Null => "{}".to_string(),
            other => other.to_string(),
        };
        compact.chars().take(80).collect()
    }
}

/// Optional envelope fields supplied by the caller alongside `data`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMeta {
    pub agent: Option<String>,
    pub source: Option<String>,
    pub session: Option<String>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

impl EntryMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
