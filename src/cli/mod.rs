//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trend-trader")]
#[command(author, version, about = "Streaming MACD trend trader for Bitget futures")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level, overrides `logging.level`
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream candles and trade on MACD crossovers
    Run(RunArgs),
    /// Load, validate and print the effective configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Trade against an in-process paper exchange instead of Bitget
    #[arg(long)]
    pub dry_run: bool,

    /// Starting balance of the paper exchange
    #[arg(long, default_value = "1000")]
    pub paper_balance: Decimal,

    /// Initial paper price; afterwards the latest close is used
    #[arg(long)]
    pub paper_price: Option<Decimal>,

    /// Symbol to trade, overrides `stream.symbol`
    #[arg(short = 'S', long)]
    pub symbol: Option<String>,
}
