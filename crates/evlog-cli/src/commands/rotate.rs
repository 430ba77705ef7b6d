use std::process::ExitCode;

use anyhow::Result;
use evlog_config::Config;
use evlog_engine::{Ingestor, RotationManager};

use super::open_store;

pub async fn handle(config: &Config) -> Result<ExitCode> {
    let store = open_store(config).await?;

    // 1. Ingest pending lines
    if config.rotation.ingest_before_rotate {
        let report = Ingestor::from_config(&store, config)?.ingest().await?;
        println!("✓ Ingested {} rows before rotating", report.rows_inserted);
    }

    // 2. Rotate oversized files
    let manager = RotationManager::from_config(config);
    let rotated = manager.rotate_all().await?;
    if rotated.is_empty() {
        println!("No files over {} MB.", config.rotation.max_size_mb);
    }
    for file in &rotated {
        println!("✓ Rotated {}", file.source.display());
        println!("  Archive: {}", file.archive.display());
        println!("  Kept lines: {}", file.kept_lines);
    }

    // 3. Prune archives
    for month in manager.clean_old_archives(config.rotation.keep_months).await? {
        println!("✓ Removed archive {}", month);
    }

    // 4. Move old rows out of the store
    let archived = manager
        .archive_old_rows(&store, config.rotation.db_retention_days)
        .await?;
    for month in &archived {
        println!(
            "✓ Archived {} rows from {} to {}",
            month.rows,
            month.month,
            month.path.display()
        );
    }

    store.close().await;
    Ok(ExitCode::SUCCESS)
}
