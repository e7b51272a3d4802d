//! Streaming MACD trend trader for Bitget futures.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use trading_config::load_config;
use trading_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let level = cli
        .log_level
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| config.logging.level.clone());
    let json = cli.json_logs || config.logging.is_json();
    let _log_guard = setup_logging(&level, json, config.logging.file.as_deref().map(Path::new))
        .context("failed to initialize logging")?;

    match cli.command {
        Commands::Run(args) => cli::commands::run::run(args, config).await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config, &config),
    }
}
