use std::process::ExitCode;

use anyhow::Result;
use evlog_config::Config;
use evlog_core::{LogEntry, LogLayout, QueryFilter, parse_time_expr, timestamp};
use evlog_engine::{QuerySource, QueryViewer, Tail};
use time::OffsetDateTime;
use tracing::info;

use super::{format_entry, open_store};
use crate::cli::ViewArgs;

pub async fn handle(args: ViewArgs, config: &Config) -> Result<ExitCode> {
    let filter = build_filter(&args, timestamp::now())?;
    let viewer = QueryViewer::new(LogLayout::new(&config.log_dir));

    if args.tail {
        follow(&viewer, filter, args.json, config).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let store = if args.db {
        Some(open_store(config).await?)
    } else {
        None
    };
    let source = match &store {
        Some(store) => QuerySource::Store(store),
        None => QuerySource::Files,
    };

    let code = if args.count {
        let count = viewer.count(&filter, source).await?;
        println!("{}", count);
        if args.fail_if_found && count > 0 {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    } else {
        let entries = viewer.query(&filter, source).await?;
        if entries.is_empty() && !args.json {
            println!("No matching entries.");
        }
        // newest first from the query; print in reading order
        for entry in entries.iter().rev() {
            print_entry(entry, args.json);
        }
        ExitCode::SUCCESS
    };

    if let Some(store) = store {
        store.close().await;
    }
    Ok(code)
}

async fn follow(viewer: &QueryViewer, filter: QueryFilter, json: bool, config: &Config) -> Result<()> {
    let path = viewer.file_for(&filter)?;
    info!("Following {} (Ctrl-C to stop)", path.display());

    let mut tail = Tail::from_end(path, filter).await?;
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    tail.follow(config.tail_poll_interval(), shutdown, |entry| {
        print_entry(entry, json)
    })
    .await?;
    Ok(())
}

fn print_entry(entry: &LogEntry, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(entry) {
            println!("{}", line);
        }
    } else {
        println!("{}", format_entry(entry));
    }
}

fn build_filter(args: &ViewArgs, now: OffsetDateTime) -> Result<QueryFilter> {
    let mut filter = QueryFilter::new();
    if let Some(event) = &args.event {
        filter = filter.with_event(event);
    }
    if let Some(level) = args.level {
        filter = filter.with_level(level);
    }
    if let Some(agent) = &args.agent {
        filter = filter.with_agent(agent);
    }
    if let Some(grep) = &args.grep {
        filter = filter.with_grep(grep);
    }

    let from = args
        .last
        .as_deref()
        .or(args.from.as_deref())
        .map(|expr| parse_time_expr(expr, now))
        .transpose()?;
    let to = args
        .to
        .as_deref()
        .map(|expr| parse_time_expr(expr, now))
        .transpose()?;
    filter = filter.with_range(from, to);

    if let Some(limit) = args.limit {
        filter = filter.with_limit(limit);
    }
    Ok(filter)
}
