//! Log file sources for evlog
//!
//! This crate provides:
//! - An offset-bounded reader that yields only complete lines
//! - The JSONL stream source written by the event logger
//! - Plain-text sources parsed with a configurable line pattern

pub mod handler;
pub mod jsonl;
pub mod raw;
pub mod reader;

pub use handler::{SourceHandler, SourceRecord};
pub use jsonl::JsonlSource;
pub use raw::{DEFAULT_LINE_PATTERN, LinePattern, RawRecord, RawSource};
pub use reader::{LineReader, fingerprint};
