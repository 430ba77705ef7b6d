use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use evlog_config::Config;
use evlog_core::EntryMeta;
use evlog_core::layout::validate_event_name;
use evlog_logger::{EventLogger, WriteOutcome};
use evlog_security::Redactor;
use serde_json::Value;

use crate::cli::EmitArgs;

pub fn handle(args: EmitArgs, config: &Config) -> Result<ExitCode> {
    validate_event_name(&args.event)?;
    let data: Value = serde_json::from_str(&args.data).context("--data is not valid JSON")?;

    let meta = build_meta(&args);

    if args.verbose {
        let (_, redactions) = Redactor::shared().redact_with_report(&data);
        for redaction in &redactions {
            println!("  Redacted {} x{}", redaction.redaction_type, redaction.count);
        }
    }

    let logger = EventLogger::new(&config.log_dir, config.min_level);
    let written = logger.write(args.level, &args.event, &data, meta);
    let closed = logger.close();

    let faults: Vec<String> = written
        .faults()
        .iter()
        .chain(closed.faults())
        .map(ToString::to_string)
        .collect();
    if !faults.is_empty() {
        bail!("Failed to log {}: {}", args.event, faults.join("; "));
    }

    match written {
        WriteOutcome::Filtered => println!(
            "Skipped {} ({} is below min_level {})",
            args.event, args.level, config.min_level
        ),
        _ => println!("✓ Logged {} ({})", args.event, args.level),
    }
    Ok(ExitCode::SUCCESS)
}

fn build_meta(args: &EmitArgs) -> EntryMeta {
    let mut meta = EntryMeta::new();
    if let Some(agent) = &args.agent {
        meta = meta.with_agent(agent);
    }
    if let Some(source) = &args.source {
        meta = meta.with_source(source);
    }
    if let Some(session) = &args.session {
        meta = meta.with_session(session);
    }
    meta
}
