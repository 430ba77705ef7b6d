//! Storage layer for evlog
//!
//! This crate provides:
//! - The SQLite-backed indexed store (`IndexedStore`)
//! - Ingest offset bookkeeping committed with each batch
//! - Month-bucketed archival of old rows

pub mod archive;
pub mod db;
pub mod error;
pub mod models;
mod schema;

pub use archive::ArchivedMonth;
pub use db::IndexedStore;
pub use error::{Result, StorageError};
pub use models::{IngestBatch, IngestState, RawRow, StructuredInsert, StructuredRow};
