//! Position record and ledger error types

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Long position, opened at the ask
    Buy,
    /// Short position, opened at the bid
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

/// Lifecycle status of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// A single position as tracked by the ledger
///
/// `id`, `ticket`, `symbol`, `direction`, `lot_size`, `strategy`, `opened_at`
/// and `entry_price` form the identity of the record and never change after
/// the first upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Ledger identifier
    pub id: String,
    /// Broker ticket
    pub ticket: String,
    /// Traded symbol
    pub symbol: String,
    /// Trade direction
    pub direction: Direction,
    /// Volume in lots
    pub lot_size: Decimal,
    /// Open or closed
    pub status: PositionStatus,
    /// Open timestamp (server time)
    pub opened_at: NaiveDateTime,
    /// Owning strategy name
    pub strategy: String,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<NaiveDateTime>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Stop-loss distance in price steps
    pub stop_loss_points: Option<u32>,
    #[serde(default)]
    pub commission: Decimal,
    /// Realized profit once closed, last known floating profit while open
    #[serde(default)]
    pub profit: Decimal,
    #[serde(default)]
    pub slippage_entry: Decimal,
    #[serde(default)]
    pub slippage_exit: Decimal,
    pub comment: Option<String>,
}

impl PositionRecord {
    /// Whether the position is still open
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Day the position was opened on
    pub fn opened_on(&self) -> NaiveDate {
        self.opened_at.date()
    }

    /// Whether `other` describes the same position identity
    pub fn same_identity(&self, other: &PositionRecord) -> bool {
        self.id == other.id
            && self.ticket == other.ticket
            && self.symbol == other.symbol
            && self.direction == other.direction
            && self.lot_size == other.lot_size
            && self.strategy == other.strategy
            && self.opened_at == other.opened_at
            && self.entry_price == other.entry_price
    }
}

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Reading or writing the backing file failed
    #[error("Ledger I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The backing file is not a valid ledger document
    #[error("Ledger document {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// Serializing the ledger failed
    #[error("Ledger serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    /// An upsert tried to rewrite identity fields of an existing record
    #[error("Position {0} identity cannot change")]
    IdentityChanged(String),
}
