use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use evlog_core::Level;

#[derive(Parser)]
#[command(name = "evlog")]
#[command(about = "Structured event logs: write, rotate, ingest and query", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true, env = "EVLOG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query or follow logged events
    View(ViewArgs),

    /// Archive oversized log files and prune old archives
    Rotate,

    /// Load new lines from log files into the indexed store
    Ingest,

    /// Write one entry (for shell scripts)
    Emit(EmitArgs),
}

#[derive(Args)]
pub struct ViewArgs {
    /// Event name
    #[arg(long)]
    pub event: Option<String>,

    /// Exact level (debug, info, warn, error, fatal)
    #[arg(long)]
    pub level: Option<Level>,

    #[arg(long)]
    pub agent: Option<String>,

    /// Substring to search for
    #[arg(long)]
    pub grep: Option<String>,

    /// Start of range: timestamp, date, or relative (30m, 24h, 7d)
    #[arg(long, conflicts_with = "last")]
    pub from: Option<String>,

    /// End of range
    #[arg(long)]
    pub to: Option<String>,

    /// Shorthand for --from with a relative window, e.g. 24h
    #[arg(long)]
    pub last: Option<String>,

    #[arg(long)]
    pub limit: Option<usize>,

    /// Print raw JSON lines
    #[arg(long)]
    pub json: bool,

    /// Follow new entries until interrupted
    #[arg(long, conflicts_with_all = ["count", "db"])]
    pub tail: bool,

    /// Print the number of matches only
    #[arg(long)]
    pub count: bool,

    /// Query the indexed store instead of the log files
    #[arg(long)]
    pub db: bool,

    /// With --count, exit 1 when anything matched
    #[arg(long, requires = "count")]
    pub fail_if_found: bool,
}

#[derive(Args)]
pub struct EmitArgs {
    /// Event name, e.g. job.run
    pub event: String,

    #[arg(long, default_value = "info")]
    pub level: Level,

    /// JSON payload
    #[arg(long, default_value = "{}")]
    pub data: String,

    #[arg(long)]
    pub agent: Option<String>,

    #[arg(long)]
    pub source: Option<String>,

    #[arg(long)]
    pub session: Option<String>,

    /// Show which redactions were applied
    #[arg(long)]
    pub verbose: bool,
}
