//! Backtest summary recording and reporting

use super::BacktestError;
use crate::clock::Clock;
use crate::ledger::PositionRecord;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of one strategy over the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyMetrics {
    /// Net profit of closed positions
    pub profit: Decimal,
    /// Closed position count
    pub trades: usize,
}

/// Running profit and the balance it implies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceInfo {
    pub profit: Decimal,
    pub balance: Decimal,
}

/// Backtest summary artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub initial_deposit: Decimal,
    pub total_profit: Decimal,
    pub final_balance: Decimal,
    pub strategies: BTreeMap<String, StrategyMetrics>,
    /// Day of the latest closed trade
    pub last_trade_day: Option<NaiveDate>,
    /// Wall-clock start of the run
    pub started_at: Option<NaiveDateTime>,
    /// Wall-clock end of the run
    pub ended_at: Option<NaiveDateTime>,
    /// Wall-clock duration as `HH:MM`
    pub duration: Option<String>,
}

impl SummaryReport {
    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let time = |t: Option<NaiveDateTime>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        };

        let mut strategies = String::new();
        for (name, metrics) in &self.strategies {
            strategies.push_str(&format!(
                "{:<18}{:>+12.2}  ({} trades)\n",
                name, metrics.profit, metrics.trades
            ));
        }
        if strategies.is_empty() {
            strategies.push_str("No closed trades\n");
        }

        format!(
            r#"
══════════════════════════════════════════════════════
               BACKTEST RESULTS
══════════════════════════════════════════════════════

PERIOD
───────────────────────────────────────────────────────
From:             {}
To:               {}

ACCOUNT
───────────────────────────────────────────────────────
Initial Deposit:  {:.2}
Total Profit:     {:+.2}
Final Balance:    {:.2}

STRATEGIES
───────────────────────────────────────────────────────
{}
Run Duration:     {}
══════════════════════════════════════════════════════
"#,
            time(self.start_time),
            time(self.end_time),
            self.initial_deposit,
            self.total_profit,
            self.final_balance,
            strategies,
            self.duration.as_deref().unwrap_or("-"),
        )
    }
}

/// Builds the summary while a backtest runs
///
/// Wall-clock timing comes from an injected [`Clock`] so a run can be
/// reproduced byte for byte.
pub struct SummaryRecorder {
    wall_clock: Arc<dyn Clock>,
    path: Option<PathBuf>,
    report: SummaryReport,
    counted: HashSet<String>,
}

impl SummaryRecorder {
    pub fn new(initial_deposit: Decimal, wall_clock: Arc<dyn Clock>) -> Self {
        Self {
            wall_clock,
            path: None,
            report: SummaryReport {
                initial_deposit,
                final_balance: initial_deposit,
                ..Default::default()
            },
            counted: HashSet::new(),
        }
    }

    /// Write the artifact to `path` on every save
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn report(&self) -> &SummaryReport {
        &self.report
    }

    pub fn mark_wall_start(&mut self) {
        self.report.started_at = Some(self.wall_clock.now());
    }

    /// Stamp the wall-clock end and the run duration
    pub fn mark_wall_end(&mut self) {
        let ended = self.wall_clock.now();
        self.report.ended_at = Some(ended);
        if let Some(started) = self.report.started_at {
            let seconds = (ended - started).num_seconds().max(0);
            self.report.duration = Some(format!("{:02}:{:02}", seconds / 3600, seconds % 3600 / 60));
        }
    }

    pub fn set_time_range(&mut self, start: NaiveDateTime, end: NaiveDateTime) {
        self.report.start_time = Some(start);
        self.report.end_time = Some(end);
    }

    /// Count a closed position once
    pub fn record_closed(&mut self, record: &PositionRecord) {
        if record.is_open() || !self.counted.insert(record.id.clone()) {
            return;
        }

        let net = (record.profit
            - record.commission
            - record.slippage_entry
            - record.slippage_exit)
            .round_dp(2);
        self.report.total_profit += net;
        self.report.final_balance = self.report.initial_deposit + self.report.total_profit;

        let metrics = self
            .report
            .strategies
            .entry(record.strategy.clone())
            .or_default();
        metrics.profit += net;
        metrics.trades += 1;

        if let Some(exit) = record.exit_time {
            self.report.last_trade_day = Some(exit.date());
        }
    }

    pub fn total_profit(&self) -> Decimal {
        self.report.total_profit
    }

    pub fn balance_info(&self) -> BalanceInfo {
        BalanceInfo {
            profit: self.report.total_profit,
            balance: self.report.final_balance,
        }
    }

    /// Write the current summary, if a path is configured
    pub fn save(&self) -> Result<(), BacktestError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| BacktestError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&self.report)?;
        fs::write(path, json).map_err(|source| BacktestError::Io {
            path: path.clone(),
            source,
        })
    }

    /// Final summary
    pub fn finish(mut self) -> Result<SummaryReport, BacktestError> {
        self.mark_wall_end();
        self.save()?;
        Ok(self.report)
    }
}
