//! Risk gate types

use crate::ledger::LedgerError;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Risk gate errors
#[derive(Debug, Error)]
pub enum RiskError {
    /// Thresholds could not be loaded
    #[error(transparent)]
    Loader(anyhow::Error),
    /// Snapshot could not be persisted
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Account risk state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskEvent {
    /// New trading day started at this balance
    NewDay { begin_balance: Decimal },
    /// New trading week started at this balance
    NewWeek { begin_balance: Decimal },
    /// Break-even armed; the daily stop moved to `stop`
    BreakEvenReached { stop: Decimal },
    /// Daily take-profit reached at `profit`
    TakeProfitReached { profit: Decimal },
    /// Daily stop-loss reached at `profit`
    StopLossReached { profit: Decimal },
    /// Weekly take-profit reached at `profit`
    WeeklyTargetReached { profit: Decimal },
}

impl RiskEvent {
    /// Whether the event stops new entries
    pub fn blocks_entries(&self) -> bool {
        matches!(
            self,
            RiskEvent::TakeProfitReached { .. }
                | RiskEvent::StopLossReached { .. }
                | RiskEvent::WeeklyTargetReached { .. }
        )
    }
}

impl fmt::Display for RiskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskEvent::NewDay { begin_balance } => {
                write!(f, "New trading day with begin balance {begin_balance}")
            }
            RiskEvent::NewWeek { begin_balance } => {
                write!(f, "New trading week begins with begin balance {begin_balance}")
            }
            RiskEvent::BreakEvenReached { stop } => {
                write!(f, "Break-even reached, account stop moved to {stop}")
            }
            RiskEvent::TakeProfitReached { profit } => {
                write!(f, "Daily take profit reached at {profit}. No more trades today.")
            }
            RiskEvent::StopLossReached { profit } => {
                write!(f, "Daily stop loss reached at {profit}. No more trades today.")
            }
            RiskEvent::WeeklyTargetReached { profit } => {
                write!(f, "Weekly profit reached at {profit}. No more trades this week.")
            }
        }
    }
}
