//! Core domain models for evlog
//!
//! This crate contains:
//! - The structured log record (`LogEntry`) and its severity `Level`
//! - Canonical timestamp formatting shared by writers, ingest and queries
//! - The on-disk directory layout (`LogLayout`)
//! - Query filters used by both the file scanner and the indexed store

pub mod entry;
pub mod error;
pub mod filter;
pub mod layout;
pub mod timestamp;

pub use entry::{EntryMeta, Level, LogEntry};
pub use error::{Error, Result};
pub use filter::{QueryFilter, parse_time_expr};
pub use layout::{LogLayout, UNIFIED_FILE_NAME};
