//! Write path for structured events
//!
//! [`EventLogger`] appends redacted JSONL records to `<event>.jsonl` and
//! mirrors them to `all.jsonl`. Writing never fails from the caller's point
//! of view: problems come back as a [`WriteOutcome::Degraded`] and are also
//! published as [`Alert`]s on an optional side channel.

pub mod fault;
pub mod flusher;
pub mod logger;
mod sinks;

pub use fault::{Alert, LoggerFault, WriteOutcome};
pub use flusher::FlusherHandle;
pub use logger::EventLogger;
