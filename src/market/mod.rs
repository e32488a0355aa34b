//! Market data module
//!
//! Historical bars, daily range windows and trading sessions

mod history;
mod hours;
mod range;

pub use history::HistoricalMarket;
pub use hours::{MarketHours, MarketSession};
pub use range::RangeWindow;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time
    pub time: NaiveDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Market data errors
#[derive(Debug, Error)]
pub enum MarketDataError {
    /// No data file for a configured symbol
    #[error("No historical data for symbol {0}")]
    MissingSymbol(String),
    /// The CSV file could not be read
    #[error("Failed to read {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    /// A row could not be parsed
    #[error("{path}:{line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}
