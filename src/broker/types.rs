//! Broker request and response types

use crate::calculator::{ProfitResult, Valuation, VolumeLimits};
use crate::ledger::Direction;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Static contract details of a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSpec {
    /// Smallest price increment
    pub tick_size: Decimal,
    /// Account-currency value of one tick for one lot
    pub tick_value: Decimal,
    /// Units per lot
    pub contract_size: Decimal,
    /// Price decimal places
    pub precision: u32,
    pub min_volume: Decimal,
    pub max_volume: Decimal,
    pub volume_step: Decimal,
}

impl SymbolSpec {
    pub fn volume_limits(&self) -> VolumeLimits {
        VolumeLimits {
            min: self.min_volume,
            max: self.max_volume,
            step: self.volume_step,
        }
    }

    /// Valuation inputs at `current_price`
    pub fn valuation(&self, current_price: Option<Decimal>) -> Valuation {
        Valuation {
            current_price,
            tick_size: self.tick_size,
            tick_value: self.tick_value,
            contract_size: self.contract_size,
        }
    }
}

/// A fully prepared market order
///
/// Built fresh for every entry attempt and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    /// Volume in lots
    pub lot_size: Decimal,
    /// Capital allocated to the asset
    pub capital: Decimal,
    pub risk_percent: Option<Decimal>,
    /// Stop distance in price steps
    pub stop_loss_points: u32,
    pub reward_risk_ratio: Option<Decimal>,
    /// Stop-loss price, zero for none
    pub stop_loss: Decimal,
    /// Take-profit price, zero for none
    pub take_profit: Decimal,
    /// Owning strategy name
    pub strategy: String,
    pub comment: Option<String>,
}

/// Broker response to an open request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub accepted: bool,
    /// Broker ticket of the new position
    pub ticket: Option<String>,
    /// Fill price reported by the broker
    pub price: Option<Decimal>,
    pub message: Option<String>,
}

impl OrderResult {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Broker response to a close request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloseResult {
    pub accepted: bool,
    pub exit_price: Option<Decimal>,
    /// Realized valuation when the broker reports one
    pub profit: Option<ProfitResult>,
    pub message: Option<String>,
}

impl CloseResult {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// A closed deal from broker history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerDeal {
    pub ticket: String,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<NaiveDateTime>,
    pub profit: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub slippage_entry: Option<Decimal>,
    pub slippage_exit: Option<Decimal>,
}
