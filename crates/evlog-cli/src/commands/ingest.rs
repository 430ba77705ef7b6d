use std::process::ExitCode;

use anyhow::Result;
use evlog_config::Config;
use evlog_engine::Ingestor;

use super::open_store;

pub async fn handle(config: &Config) -> Result<ExitCode> {
    let store = open_store(config).await?;
    let report = Ingestor::from_config(&store, config)?.ingest().await?;
    store.close().await;

    println!(
        "✓ Ingested {} rows from {} files",
        report.rows_inserted, report.files_scanned
    );
    if report.lines_skipped > 0 {
        println!("  Skipped {} malformed lines", report.lines_skipped);
    }
    if report.resets > 0 {
        println!("  Re-read {} truncated or replaced files", report.resets);
    }

    Ok(ExitCode::SUCCESS)
}
