//! Engine types

use crate::calculator::CalculatorError;
use crate::ledger::{LedgerError, PositionRecord};
use crate::risk::{RiskError, RiskEvent};
use crate::strategy::{DeskError, StrategyError};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors that stop the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Calculator(#[from] CalculatorError),
    #[error(transparent)]
    Risk(#[from] RiskError),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    /// Broker failure outside of a skippable step
    #[error("Broker error: {0:#}")]
    Broker(anyhow::Error),
}

/// Outcome of a failed evaluation step
#[derive(Debug, Error)]
pub enum StepError {
    /// Recoverable; the step is skipped and the cycle continues
    #[error("{0}")]
    Skip(String),
    /// Unrecoverable; the cycle stops
    #[error(transparent)]
    Fatal(#[from] EngineError),
}

impl StepError {
    pub fn skip(context: &str, err: anyhow::Error) -> Self {
        StepError::Skip(format!("{context}: {err:#}"))
    }
}

impl From<DeskError> for StepError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::Broker(e) => StepError::skip("broker", e),
            DeskError::Calculator(e) => StepError::Fatal(e.into()),
            DeskError::Ledger(e) => StepError::Fatal(e.into()),
        }
    }
}

impl From<LedgerError> for StepError {
    fn from(err: LedgerError) -> Self {
        StepError::Fatal(err.into())
    }
}

impl From<RiskError> for StepError {
    fn from(err: RiskError) -> Self {
        StepError::Fatal(err.into())
    }
}

/// Cycle stage a skip happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Broker clock, reconciliation and mark to market
    Sync,
    Risk,
    Ranges,
    Entry,
    Exit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Sync => "sync",
            Stage::Risk => "risk",
            Stage::Ranges => "ranges",
            Stage::Entry => "entry",
            Stage::Exit => "exit",
        };
        f.write_str(name)
    }
}

/// A step skipped during a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStep {
    pub stage: Stage,
    pub strategy: Option<String>,
    pub symbol: Option<String>,
    pub reason: String,
}

/// What one cycle did
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub at: NaiveDateTime,
    /// Positions opened this cycle
    pub opened: Vec<PositionRecord>,
    /// Positions closed this cycle
    pub closed: Vec<PositionRecord>,
    pub skipped: Vec<SkippedStep>,
    pub risk_events: Vec<RiskEvent>,
}

impl CycleReport {
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            at,
            ..Default::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }

    /// Turn a step outcome into a value, recording skips
    ///
    /// Fatal errors are passed through.
    pub(crate) fn settle<T>(
        &mut self,
        outcome: Result<T, StepError>,
        stage: Stage,
        strategy: Option<&str>,
        symbol: Option<&str>,
    ) -> Result<Option<T>, EngineError> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(StepError::Skip(reason)) => {
                tracing::warn!(
                    %stage,
                    strategy = strategy.unwrap_or("-"),
                    symbol = symbol.unwrap_or("-"),
                    %reason,
                    "Step skipped"
                );
                self.skipped.push(SkippedStep {
                    stage,
                    strategy: strategy.map(str::to_string),
                    symbol: symbol.map(str::to_string),
                    reason,
                });
                Ok(None)
            }
            Err(StepError::Fatal(err)) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desk_errors_map_to_skip_or_fatal() {
        let skip: StepError = DeskError::Broker(anyhow::anyhow!("no quote")).into();
        assert!(matches!(skip, StepError::Skip(ref reason) if reason == "broker: no quote"));

        let fatal: StepError =
            DeskError::Calculator(CalculatorError::MissingEntryPrice("7".into())).into();
        assert!(matches!(fatal, StepError::Fatal(EngineError::Calculator(_))));
    }

    #[test]
    fn test_settle_records_skip() {
        let mut report = CycleReport::default();
        let value = report
            .settle::<u32>(Err(StepError::Skip("closed".into())), Stage::Entry, Some("go_long"), Some("SPX500"))
            .unwrap();
        assert_eq!(value, None);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].stage, Stage::Entry);
        assert_eq!(report.skipped[0].symbol.as_deref(), Some("SPX500"));

        let value = report.settle(Ok(3), Stage::Exit, None, None).unwrap();
        assert_eq!(value, Some(3));

        let fatal = report.settle::<()>(
            Err(StepError::Fatal(EngineError::Broker(anyhow::anyhow!("down")))),
            Stage::Risk,
            None,
            None,
        );
        assert!(fatal.is_err());
    }
}
