use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use evlog_config::Config;
use evlog_core::layout::validate_event_name;
use evlog_core::{EntryMeta, Level, LogEntry, LogLayout};
use evlog_security::Redactor;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, warn};

use crate::fault::{Alert, LoggerFault, WriteOutcome};
use crate::sinks::Sinks;

/// Structured event writer, shared by `Arc` within a process.
pub struct EventLogger {
    layout: LogLayout,
    min_level: Level,
    redactor: Redactor,
    sinks: Mutex<Sinks>,
    alerts: Option<UnboundedSender<Alert>>,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>, min_level: Level) -> Self {
        Self {
            layout: LogLayout::new(log_dir),
            min_level,
            redactor: Redactor::new(),
            sinks: Mutex::new(Sinks::default()),
            alerts: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.log_dir.clone(), config.min_level)
    }

    /// Publish faults and fatal entries on `sender`.
    pub fn with_alerts(mut self, sender: UnboundedSender<Alert>) -> Self {
        self.alerts = Some(sender);
        self
    }

    pub fn layout(&self) -> &LogLayout {
        &self.layout
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    /// Append one entry to `<event>.jsonl` and `all.jsonl`.
    ///
    /// `data` and any error text are redacted before they reach disk. If
    /// `meta.error` is unset, a string `data.error` is used instead.
    pub fn write<T: Serialize>(
        &self,
        level: Level,
        event: &str,
        data: T,
        mut meta: EntryMeta,
    ) -> WriteOutcome {
        if level < self.min_level {
            return WriteOutcome::Filtered;
        }

        let mut faults = Vec::new();

        let data = match serde_json::to_value(data) {
            Ok(value) => self.redactor.redact(&value),
            Err(e) => {
                faults.push(LoggerFault::Serialize {
                    event: event.to_string(),
                    message: e.to_string(),
                });
                Value::Null
            }
        };

        if meta.error.is_none()
            && let Some(error) = data.get("error").and_then(Value::as_str)
        {
            meta.error = Some(error.to_string());
        }
        meta.error = meta.error.map(|e| self.redactor.redact_str(&e));

        let event_valid = match validate_event_name(event) {
            Ok(()) => true,
            Err(_) => {
                faults.push(LoggerFault::InvalidEvent(event.to_string()));
                false
            }
        };

        let line = {
            let mut sinks = self.lock_sinks();
            let ts = sinks.next_timestamp();
            let entry = LogEntry::new(ts, event, level)
                .with_meta(meta)
                .with_data(data);

            match serde_json::to_string(&entry) {
                Ok(mut line) => {
                    line.push('\n');
                    if event_valid
                        && let Err(fault) = sinks.append_event(&self.layout, event, &line)
                    {
                        faults.push(fault);
                    }
                    if let Err(fault) = sinks.append_unified(&self.layout, &line) {
                        faults.push(fault);
                    }
                    Some(line)
                }
                Err(e) => {
                    faults.push(LoggerFault::Serialize {
                        event: event.to_string(),
                        message: e.to_string(),
                    });
                    None
                }
            }
        };

        if level == Level::Fatal
            && let Some(line) = &line
        {
            error!("[FATAL] {}: {}", event, line.trim_end());
            self.send(Alert::Fatal {
                event: event.to_string(),
                line: line.trim_end().to_string(),
            });
        }

        self.outcome(faults)
    }

    pub fn debug(&self, event: &str, data: impl Serialize) -> WriteOutcome {
        self.write(Level::Debug, event, data, EntryMeta::default())
    }

    pub fn info(&self, event: &str, data: impl Serialize) -> WriteOutcome {
        self.write(Level::Info, event, data, EntryMeta::default())
    }

    pub fn warn(&self, event: &str, data: impl Serialize) -> WriteOutcome {
        self.write(Level::Warn, event, data, EntryMeta::default())
    }

    pub fn error(&self, event: &str, data: impl Serialize) -> WriteOutcome {
        self.write(Level::Error, event, data, EntryMeta::default())
    }

    pub fn fatal(&self, event: &str, data: impl Serialize) -> WriteOutcome {
        self.write(Level::Fatal, event, data, EntryMeta::default())
    }

    /// Flush buffered lines and release all file handles.
    pub fn flush(&self) -> WriteOutcome {
        let faults = self.lock_sinks().flush_all(&self.layout);
        self.outcome(faults)
    }

    pub fn close(&self) -> WriteOutcome {
        self.flush()
    }

    fn lock_sinks(&self) -> MutexGuard<'_, Sinks> {
        self.sinks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn outcome(&self, faults: Vec<LoggerFault>) -> WriteOutcome {
        if faults.is_empty() {
            return WriteOutcome::Written;
        }
        for fault in &faults {
            warn!("Log write degraded: {}", fault);
            self.send(Alert::Fault(fault.clone()));
        }
        WriteOutcome::Degraded(faults)
    }

    fn send(&self, alert: Alert) {
        if let Some(alerts) = &self.alerts {
            // receiver gone is not a fault
            let _ = alerts.send(alert);
        }
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        self.flush();
    }
}
