//! CLI interface for tradedesk
//!
//! Provides subcommands for:
//! - `run`: Paper trading loop on the wall clock
//! - `backtest`: Replay historical bars
//! - `status`: Show the persisted ledger
//! - `config`: Show the effective configuration

mod backtest;
mod run;
mod setup;
mod status;

pub use backtest::BacktestArgs;
pub use run::RunArgs;
pub use setup::{build_engine, load_market, paper_broker, EngineParts};
pub use status::StatusArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tradedesk")]
#[command(about = "Strategy cycle engine with account risk gating, live or backtest")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the paper trading loop
    Run(RunArgs),
    /// Replay historical data
    Backtest(BacktestArgs),
    /// Show ledger positions and account risk state
    Status(StatusArgs),
    /// Show the effective configuration
    Config,
}
