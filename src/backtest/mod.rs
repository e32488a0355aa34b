//! Backtesting module
//!
//! Replays a fixed list of timestamps through the same cycle engine the live
//! loop uses. The virtual clock is the only time source the engine sees.

mod summary;
mod timeline;

pub use summary::{BalanceInfo, StrategyMetrics, SummaryRecorder, SummaryReport};
pub use timeline::{timeline, validate as validate_timeline, Timeframe};

use crate::clock::VirtualClock;
use crate::engine::{Engine, EngineError};
use crate::market::{HistoricalMarket, MarketDataError};
use chrono::NaiveDateTime;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Cycles between two interim summary writes
pub const SUMMARY_SAVE_INTERVAL: usize = 720;

/// Backtest errors
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("Backtest timeline is empty")]
    EmptyTimeline,
    #[error("Backtest timeline is not strictly increasing at {0}")]
    UnorderedTimeline(NaiveDateTime),
    #[error("No historical data for {0}")]
    MissingData(String),
    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),
    #[error(transparent)]
    Market(#[from] MarketDataError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Fail unless every symbol has at least one bar
pub fn ensure_history<'a>(
    market: &HistoricalMarket,
    symbols: impl IntoIterator<Item = &'a str>,
) -> Result<(), BacktestError> {
    for symbol in symbols {
        if !market.has_symbol(symbol) {
            return Err(BacktestError::MissingData(symbol.to_string()));
        }
    }
    Ok(())
}

/// Drives the engine over a replay timeline
pub struct BacktestRunner {
    engine: Engine,
    clock: Arc<VirtualClock>,
    recorder: SummaryRecorder,
    timestamps: Vec<NaiveDateTime>,
    save_interval: usize,
}

impl BacktestRunner {
    /// Create a runner, rejecting an empty or unordered timeline
    pub fn new(
        engine: Engine,
        clock: Arc<VirtualClock>,
        recorder: SummaryRecorder,
        timestamps: Vec<NaiveDateTime>,
    ) -> Result<Self, BacktestError> {
        timeline::validate(&timestamps)?;
        Ok(Self {
            engine,
            clock,
            recorder,
            timestamps,
            save_interval: SUMMARY_SAVE_INTERVAL,
        })
    }

    pub fn with_save_interval(mut self, cycles: usize) -> Self {
        self.save_interval = cycles.max(1);
        self
    }

    /// Replay every timestamp and return the final summary
    pub async fn run(mut self) -> Result<SummaryReport, BacktestError> {
        let (Some(&start), Some(&end)) = (self.timestamps.first(), self.timestamps.last()) else {
            return Err(BacktestError::EmptyTimeline);
        };

        self.clock.set(start);
        self.recorder.mark_wall_start();
        self.recorder.set_time_range(start, end);
        self.engine.initialize().await?;
        tracing::info!(
            %start,
            %end,
            cycles = self.timestamps.len(),
            "Backtest started"
        );

        for (i, &at) in self.timestamps.iter().enumerate() {
            self.clock.set(at);
            let report = self.engine.run_cycle().await?;
            for record in &report.closed {
                self.recorder.record_closed(record);
            }

            if (i + 1) % self.save_interval == 0 {
                self.recorder.save()?;
                let info = self.recorder.balance_info();
                tracing::info!(
                    %at,
                    profit = %info.profit,
                    balance = %info.balance,
                    "Backtest progress"
                );
            }
        }

        self.engine.finalize();
        let summary = self.recorder.finish()?;
        tracing::info!(
            total_profit = %summary.total_profit,
            final_balance = %summary.final_balance,
            "Backtest finished"
        );
        Ok(summary)
    }
}
