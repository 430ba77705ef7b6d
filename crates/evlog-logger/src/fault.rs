use std::path::PathBuf;

use thiserror::Error;

/// A problem on the write path. Carried by value, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoggerFault {
    #[error("Invalid event name: {0:?}")]
    InvalidEvent(String),

    #[error("Failed to create log directory {path}: {message}")]
    CreateDir { path: PathBuf, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Failed to flush {path}: {message}")]
    Flush { path: PathBuf, message: String },

    #[error("Failed to serialize entry for {event}: {message}")]
    Serialize { event: String, message: String },
}

/// Result of a single write or flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Below the logger's minimum level
    Filtered,
    Degraded(Vec<LoggerFault>),
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }

    pub fn faults(&self) -> &[LoggerFault] {
        match self {
            WriteOutcome::Degraded(faults) => faults,
            _ => &[],
        }
    }
}

/// Side-channel notification for whoever supervises the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    Fault(LoggerFault),
    /// A `fatal` entry was written; `line` is the serialized record.
    Fatal { event: String, line: String },
}
