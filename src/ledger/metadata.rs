//! Ledger metadata: account snapshot and engine bookkeeping

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account state for the current trading day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    /// Trading day this snapshot belongs to
    pub day: NaiveDate,
    /// Last update time
    pub updated_at: NaiveDateTime,
    /// Balance at the start of the day
    pub begin_balance: Decimal,
    /// Balance at the start of the trading week
    pub begin_balance_week: Decimal,
    pub balance: Decimal,
    pub equity: Decimal,
    /// Equity minus begin-of-day balance
    pub profit_floating: Decimal,
    /// Equity minus begin-of-week balance
    pub profit_total_week: Decimal,
    pub target_reached: bool,
    pub break_even_reached: bool,
    pub weekly_profit_reached: bool,
}

impl DailySnapshot {
    /// Start a new day at `balance`
    ///
    /// Weekly fields carry over from `previous` unless `new_week` is set.
    pub fn begin_day(
        day: NaiveDate,
        now: NaiveDateTime,
        balance: Decimal,
        previous: Option<&DailySnapshot>,
        new_week: bool,
    ) -> Self {
        let (begin_balance_week, weekly_profit_reached) = match previous {
            Some(prev) if !new_week => (prev.begin_balance_week, prev.weekly_profit_reached),
            _ => (balance, false),
        };

        Self {
            day,
            updated_at: now,
            begin_balance: balance,
            begin_balance_week,
            balance,
            equity: balance,
            profit_floating: Decimal::ZERO,
            profit_total_week: balance - begin_balance_week,
            target_reached: false,
            break_even_reached: false,
            weekly_profit_reached,
        }
    }

    /// Record the latest account figures
    pub fn observe(&mut self, now: NaiveDateTime, balance: Decimal, equity: Decimal) {
        self.updated_at = now;
        self.balance = balance;
        self.equity = equity;
        self.profit_floating = equity - self.begin_balance;
        self.profit_total_week = equity - self.begin_balance_week;
    }

    /// Whether new entries are currently refused
    pub fn entries_blocked(&self) -> bool {
        self.target_reached || self.weekly_profit_reached
    }
}

/// Most recent noteworthy engine event, cleared at day rollover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub at: NaiveDateTime,
    pub message: String,
}

/// Everything the ledger persists besides positions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerMetadata {
    #[serde(default)]
    pub daily: Option<DailySnapshot>,
    #[serde(default)]
    pub last_event: Option<LedgerEvent>,
    /// Broker server offset from UTC in hours
    #[serde(default)]
    pub server_offset_hours: Option<i64>,
    /// Timestamp of the last broker tick seen by the live runner
    #[serde(default)]
    pub last_tick: Option<i64>,
}
