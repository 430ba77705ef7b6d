mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use evlog_config::Config;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // stdout carries query output; diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        cli::Commands::View(args) => commands::view::handle(args, &config).await,
        cli::Commands::Rotate => commands::rotate::handle(&config).await,
        cli::Commands::Ingest => commands::ingest::handle(&config).await,
        cli::Commands::Emit(args) => commands::emit::handle(args, &config),
    }
}
