//! Sizing and valuation math
//!
//! Pure functions over decimal prices. Bad market data (non-positive prices,
//! ticks or capital) yields a zero result, which callers treat as "do not
//! trade". Missing prices on a record are accounting errors and are returned
//! as [`CalculatorError`].

mod levels;
mod profit;
mod sizing;

pub use levels::StopBasis;
pub use profit::{ProfitResult, Valuation};

use rust_decimal::Decimal;
use thiserror::Error;

/// Calculator errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalculatorError {
    /// Record has no entry price
    #[error("Missing entry price for position {0}")]
    MissingEntryPrice(String),
    /// Realized profit requested without an exit price
    #[error("Missing exit price for realized profit on position {0}")]
    MissingExitPrice(String),
    /// Floating profit requested without a market price
    #[error("Missing current price for floating profit on position {0}")]
    MissingCurrentPrice(String),
}

/// Broker volume constraints for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeLimits {
    pub min: Decimal,
    pub max: Decimal,
    pub step: Decimal,
}

/// Cost model and sizing math shared by every strategy
#[derive(Debug, Clone, Default)]
pub struct Calculator {
    /// Commission charged per lot
    pub commission_per_lot: Decimal,
    /// Slippage cost per lot, split evenly between entry and exit
    pub slippage_per_lot: Decimal,
}

impl Calculator {
    /// Create a calculator with the given cost model
    pub fn new(commission_per_lot: Decimal, slippage_per_lot: Decimal) -> Self {
        Self {
            commission_per_lot,
            slippage_per_lot,
        }
    }
}
