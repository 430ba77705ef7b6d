//! Query filters shared by the file scanner, the tail follower and the
//! indexed store.

use time::{Duration, OffsetDateTime};

use crate::entry::{Level, LogEntry};
use crate::error::{Error, Result};
use crate::timestamp;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    pub event: Option<String>,
    pub level: Option<Level>,
    pub agent: Option<String>,
    /// Case-sensitive substring matched against the serialized entry
    pub grep: Option<String>,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
    pub limit: Option<usize>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_grep(mut self, needle: impl Into<String>) -> Self {
        self.grep = Some(needle.into());
        self
    }

    pub fn with_range(mut self, from: Option<OffsetDateTime>, to: Option<OffsetDateTime>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check an entry against every predicate. `line` is the raw JSONL
    /// text the entry was parsed from and is what `grep` searches.
    pub fn matches(&self, entry: &LogEntry, line: &str) -> bool {
        if self.event.as_deref().is_some_and(|e| e != entry.event) {
            return false;
        }
        if self.level.is_some_and(|l| l != entry.level) {
            return false;
        }
        if let Some(agent) = &self.agent
            && entry.agent.as_deref() != Some(agent.as_str())
        {
            return false;
        }
        if self.grep.as_deref().is_some_and(|g| !line.contains(g)) {
            return false;
        }
        if self.from.is_some_and(|from| entry.ts < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.ts > to) {
            return false;
        }
        true
    }
}

/// Resolve a time expression relative to `now`.
///
/// `30s`, `15m`, `24h`, `7d` and `2w` mean "that long before `now`";
/// anything else must be a timestamp [`timestamp::parse`] understands.
pub fn parse_time_expr(expr: &str, now: OffsetDateTime) -> Result<OffsetDateTime> {
    let expr = expr.trim();
    if let Some(ago) = relative_duration(expr) {
        return now
            .checked_sub(ago)
            .ok_or_else(|| Error::InvalidTimeExpression(expr.to_string()));
    }
    timestamp::parse(expr).ok_or_else(|| Error::InvalidTimeExpression(expr.to_string()))
}

fn relative_duration(expr: &str) -> Option<Duration> {
    let split = expr.len().checked_sub(1)?;
    if !expr.is_char_boundary(split) {
        return None;
    }
    let (digits, unit) = expr.split_at(split);
    let n = i64::from(digits.parse::<u32>().ok()?);
    match unit {
        "s" => Some(Duration::seconds(n)),
        "m" => Some(Duration::minutes(n)),
        "h" => Some(Duration::hours(n)),
        "d" => Some(Duration::days(n)),
        "w" => Some(Duration::weeks(n)),
        _ => None,
    }
}
