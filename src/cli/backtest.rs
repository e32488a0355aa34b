//! Backtest command implementation

use super::setup::{build_engine, load_market, paper_broker, EngineParts};
use crate::backtest::{ensure_history, timeline, BacktestRunner, SummaryRecorder, Timeframe};
use crate::broker::LogNotifier;
use crate::clock::{VirtualClock, WallClock};
use crate::config::Config;
use crate::ledger::Ledger;
use crate::risk::StaticRiskLoader;
use crate::strategy::StrategyRegistry;
use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct BacktestArgs {
    /// First day to replay (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to replay, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Replay step: M1, M5, M15, M30, H1, H4 or D1
    #[arg(long)]
    pub timeframe: Option<Timeframe>,

    /// Initial deposit
    #[arg(long)]
    pub deposit: Option<Decimal>,

    /// Directory containing `<SYMBOL>.csv` files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Summary JSON output path
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output format: json or table
    #[arg(long, default_value = "table")]
    pub format: String,
}

impl BacktestArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(from) = self.from {
            config.backtest.date_from = Some(from);
        }
        if let Some(to) = self.to {
            config.backtest.date_to = Some(to);
        }
        if let Some(timeframe) = self.timeframe {
            config.backtest.timeframe = timeframe;
        }
        if let Some(deposit) = self.deposit {
            config.broker.deposit = deposit;
        }
        if let Some(dir) = &self.data_dir {
            config.broker.data_dir = dir.clone();
        }
        if let Some(output) = &self.output {
            config.backtest.summary_path = Some(output.clone());
        }
    }

    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut config = config.clone();
        self.apply(&mut config);

        let registry = StrategyRegistry::builtin();
        config.validate(&registry)?;

        let (from, to) = config
            .backtest
            .period()
            .context("Backtest period missing: set backtest.date_from and backtest.date_to")?;
        let timestamps = timeline(from, to, config.backtest.timeframe);

        let market = load_market(&config)?;
        let symbols = config.traded_symbols();
        ensure_history(&market, symbols.iter().map(String::as_str))?;

        let clock = Arc::new(VirtualClock::new(from));
        let broker = Arc::new(paper_broker(&config, market, clock.clone()));
        let ledger = match &config.backtest.ledger_path {
            Some(path) => Ledger::reset(path)
                .with_context(|| format!("Failed to reset ledger {}", path.display()))?,
            None => Ledger::in_memory(),
        };

        let engine = build_engine(
            &config,
            &registry,
            EngineParts {
                clock: clock.clone(),
                broker,
                ledger,
                risk_loader: Box::new(StaticRiskLoader::new(config.risk.clone())),
                notifier: Arc::new(LogNotifier::new(clock.clone()).disabled()),
            },
        )?;

        let mut recorder = SummaryRecorder::new(config.broker.deposit, Arc::new(WallClock::new()));
        if let Some(path) = &config.backtest.summary_path {
            recorder = recorder.with_path(path);
        }

        tracing::info!(
            %from,
            %to,
            timeframe = %config.backtest.timeframe,
            "Running backtest"
        );
        let summary = BacktestRunner::new(engine, clock, recorder, timestamps)?
            .run()
            .await?;

        match self.format.as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
            _ => println!("{}", summary.format_table()),
        }
        Ok(())
    }
}
