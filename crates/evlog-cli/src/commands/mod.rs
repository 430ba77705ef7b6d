pub mod emit;
pub mod ingest;
pub mod rotate;
pub mod view;

use anyhow::{Context, Result};
use evlog_config::Config;
use evlog_core::LogEntry;
use evlog_storage::IndexedStore;
use time::macros::format_description;

pub async fn open_store(config: &Config) -> Result<IndexedStore> {
    IndexedStore::open(&config.db_path)
        .await
        .with_context(|| format!("Failed to open {}", config.db_path.display()))
}

/// `HH:MM:SS.mmm LEVEL agent    event                     summary`
pub fn format_entry(entry: &LogEntry) -> String {
    let time = entry
        .ts
        .format(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:3]"
        ))
        .unwrap_or_default();
    format!(
        "{} {:<5} {:<8} {:<25} {}",
        time,
        entry.level.as_str().to_uppercase(),
        entry.agent.as_deref().unwrap_or(""),
        entry.event,
        entry.summary()
    )
}
