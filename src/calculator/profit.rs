//! Profit, commission and slippage valuation

use super::{Calculator, CalculatorError};
use crate::ledger::{Direction, PositionRecord};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Market inputs needed to value a position
#[derive(Debug, Clone, Copy)]
pub struct Valuation {
    /// Price to value an open position at (bid for buys, ask for sells)
    pub current_price: Option<Decimal>,
    pub tick_size: Decimal,
    pub tick_value: Decimal,
    pub contract_size: Decimal,
}

/// Valuation of a position, rounded to cents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitResult {
    /// Gross profit before costs
    pub profit: Decimal,
    pub commission: Decimal,
    pub slippage_entry: Decimal,
    pub slippage_exit: Decimal,
}

impl ProfitResult {
    /// Profit after commission and slippage
    pub fn net(&self) -> Decimal {
        self.profit - self.commission - self.slippage_entry - self.slippage_exit
    }
}

impl Calculator {
    /// Value `record`
    ///
    /// With `realized` the record's exit price is used, otherwise
    /// `valuation.current_price`.
    pub fn profit(
        &self,
        record: &PositionRecord,
        valuation: Valuation,
        realized: bool,
    ) -> Result<ProfitResult, CalculatorError> {
        let entry = record
            .entry_price
            .ok_or_else(|| CalculatorError::MissingEntryPrice(record.ticket.clone()))?;

        let price = if realized {
            record
                .exit_price
                .ok_or_else(|| CalculatorError::MissingExitPrice(record.ticket.clone()))?
        } else {
            valuation
                .current_price
                .ok_or_else(|| CalculatorError::MissingCurrentPrice(record.ticket.clone()))?
        };

        let mut diff = price - entry;
        if record.direction == Direction::Sell {
            diff = -diff;
        }

        let gross = if valuation.tick_size > Decimal::ZERO && valuation.tick_value > Decimal::ZERO {
            diff / valuation.tick_size * valuation.tick_value * record.lot_size
        } else {
            let contract = if valuation.contract_size > Decimal::ZERO {
                valuation.contract_size
            } else {
                Decimal::ONE
            };
            diff * record.lot_size * contract
        };

        let commission = self.commission_per_lot * record.lot_size;
        let half_slippage = self.slippage_per_lot * record.lot_size * dec!(0.5);

        Ok(ProfitResult {
            profit: gross.round_dp(2),
            commission: commission.round_dp(2),
            slippage_entry: half_slippage.round_dp(2),
            slippage_exit: half_slippage.round_dp(2),
        })
    }
}
