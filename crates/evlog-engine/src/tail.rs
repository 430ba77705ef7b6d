use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use evlog_core::{LogEntry, QueryFilter};
use evlog_sources::{LineReader, fingerprint};
use tracing::debug;

use crate::{EngineError, Result};

/// How far back from the end `from_end` looks for the last complete line.
const RESUME_WINDOW: u64 = 64 * 1024;

/// Follows one JSONL file, yielding complete lines as they are appended.
///
/// When the file is rotated, truncated or replaced, reading resumes just
/// after the last line already seen if the new file still contains it
/// (a rotation's retained tail), and from the start otherwise.
pub struct Tail {
    path: PathBuf,
    filter: QueryFilter,
    offset: u64,
    head: Option<String>,
    last_line: Option<String>,
    resync: bool,
}

impl Tail {
    /// Start after the last complete line of `path` (or at 0 if it does not
    /// exist yet).
    pub async fn from_end(path: impl Into<PathBuf>, filter: QueryFilter) -> Result<Self> {
        let path = path.into();
        let mut tail = Self {
            path,
            filter,
            offset: 0,
            head: None,
            last_line: None,
            resync: false,
        };

        let size = match tokio::fs::metadata(&tail.path).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(tail),
            Err(e) => return Err(e.into()),
        };

        let start = size.saturating_sub(RESUME_WINDOW);
        let mut reader = LineReader::open(&tail.path, start, size).await?;
        while let Some(line) = reader.next_line().await? {
            tail.last_line = Some(line);
        }
        tail.offset = if start == 0 || tail.last_line.is_some() {
            reader.offset()
        } else {
            size
        };
        if tail.offset > 0 {
            tail.head = Some(fingerprint(&tail.path, tail.offset).await?);
        }
        Ok(tail)
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Matching entries appended since the last poll.
    pub async fn poll(&mut self) -> Result<Vec<LogEntry>> {
        match self.read_new().await {
            Err(EngineError::Core(evlog_core::Error::Io(e))) | Err(EngineError::Io(e))
                if e.kind() == ErrorKind::NotFound =>
            {
                // mid-rotation: the path comes back with the retained tail
                self.resync = true;
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn read_new(&mut self) -> Result<Vec<LogEntry>> {
        let size = tokio::fs::metadata(&self.path).await?.len();

        if size < self.offset {
            debug!("{} shrank, resyncing", self.path.display());
            self.resync = true;
        } else if self.offset > 0
            && let Some(head) = &self.head
            && fingerprint(&self.path, self.offset).await? != *head
        {
            debug!("{} was replaced, resyncing", self.path.display());
            self.resync = true;
        }

        if self.resync {
            self.offset = resume_offset(&self.path, size, self.last_line.as_deref()).await?;
            self.resync = false;
        }
        if size == self.offset {
            return Ok(Vec::new());
        }

        let mut reader = LineReader::open(&self.path, self.offset, size).await?;
        let mut entries = Vec::new();
        while let Some(line) = reader.next_line().await? {
            if let Ok(entry) = serde_json::from_str::<LogEntry>(&line)
                && self.filter.matches(&entry, &line)
            {
                entries.push(entry);
            }
            self.last_line = Some(line);
        }

        self.offset = reader.offset();
        if self.offset > 0 {
            self.head = Some(fingerprint(&self.path, self.offset).await?);
        }
        Ok(entries)
    }

    /// Poll every `every` and hand each new entry to `on_entry` until
    /// `shutdown` resolves.
    pub async fn follow<S, F>(&mut self, every: Duration, shutdown: S, mut on_entry: F) -> Result<()>
    where
        S: Future<Output = ()>,
        F: FnMut(&LogEntry),
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    for entry in self.poll().await? {
                        on_entry(&entry);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Offset just past the last occurrence of `last_line` in `path`, or 0.
async fn resume_offset(path: &Path, size: u64, last_line: Option<&str>) -> Result<u64> {
    let Some(last_line) = last_line else {
        return Ok(0);
    };

    let mut reader = LineReader::open(path, 0, size).await?;
    let mut resume = 0;
    while let Some(line) = reader.next_line().await? {
        if line == last_line {
            resume = reader.offset();
        }
    }
    Ok(resume)
}
