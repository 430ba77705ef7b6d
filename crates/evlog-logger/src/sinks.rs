//! Open file handles behind the logger's mutex

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use evlog_core::LogLayout;
use time::{Duration, OffsetDateTime};

use crate::fault::LoggerFault;

#[derive(Default)]
pub(crate) struct Sinks {
    dir_ready: bool,
    unified: Option<BufWriter<File>>,
    events: HashMap<String, BufWriter<File>>,
    last_ts: Option<OffsetDateTime>,
}

impl Sinks {
    /// Next timestamp for this process, strictly after the previous one.
    /// Ingest deduplicates by line content, so no two lines may be equal.
    pub(crate) fn next_timestamp(&mut self) -> OffsetDateTime {
        let now = evlog_core::timestamp::now();
        let ts = match self.last_ts {
            Some(last) if last >= now => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_ts = Some(ts);
        ts
    }

    pub(crate) fn append_event(
        &mut self,
        layout: &LogLayout,
        event: &str,
        line: &str,
    ) -> Result<(), LoggerFault> {
        self.ensure_dir(layout)?;
        let path = layout.event_file(event);

        if !self.events.contains_key(event) {
            let writer = open_append(&path)?;
            self.events.insert(event.to_string(), writer);
        }

        let result = match self.events.get_mut(event) {
            Some(writer) => writer.write_all(line.as_bytes()),
            None => Ok(()),
        };
        if let Err(e) = result {
            // reopen on the next write
            self.events.remove(event);
            return Err(LoggerFault::Write {
                path,
                message: e.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn append_unified(&mut self, layout: &LogLayout, line: &str) -> Result<(), LoggerFault> {
        self.ensure_dir(layout)?;
        let path = layout.unified_file();

        if self.unified.is_none() {
            self.unified = Some(open_append(&path)?);
        }

        if let Some(writer) = self.unified.as_mut()
            && let Err(e) = writer.write_all(line.as_bytes())
        {
            self.unified = None;
            return Err(LoggerFault::Write {
                path,
                message: e.to_string(),
            });
        }
        Ok(())
    }

    /// Flush and release every handle so the next write reopens by path.
    pub(crate) fn flush_all(&mut self, layout: &LogLayout) -> Vec<LoggerFault> {
        let mut faults = Vec::new();
        self.dir_ready = false;

        if let Some(mut writer) = self.unified.take()
            && let Err(e) = writer.flush()
        {
            faults.push(LoggerFault::Flush {
                path: layout.unified_file(),
                message: e.to_string(),
            });
        }

        for (event, mut writer) in self.events.drain() {
            if let Err(e) = writer.flush() {
                faults.push(LoggerFault::Flush {
                    path: layout.event_file(&event),
                    message: e.to_string(),
                });
            }
        }

        faults
    }

    fn ensure_dir(&mut self, layout: &LogLayout) -> Result<(), LoggerFault> {
        if self.dir_ready {
            return Ok(());
        }
        std::fs::create_dir_all(layout.root()).map_err(|e| LoggerFault::CreateDir {
            path: layout.root().to_path_buf(),
            message: e.to_string(),
        })?;
        self.dir_ready = true;
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<BufWriter<File>, LoggerFault> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|e| LoggerFault::Write {
            path: PathBuf::from(path),
            message: e.to_string(),
        })
}
