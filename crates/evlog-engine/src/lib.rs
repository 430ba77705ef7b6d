//! Batch jobs and queries over a log directory
//!
//! - [`Ingestor`] copies new lines into the indexed store
//! - [`RotationManager`] archives oversized files and old store rows
//! - [`QueryViewer`] and [`Tail`] read entries back

pub mod error;
pub mod ingest;
pub mod query;
pub mod rotate;
pub mod tail;

pub use error::{EngineError, Result};
pub use ingest::{IngestReport, Ingestor};
pub use query::{QuerySource, QueryViewer};
pub use rotate::{RotatedFile, RotationManager};
pub use tail::Tail;
