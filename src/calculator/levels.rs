//! Stop-loss and take-profit levels

use super::Calculator;
use crate::ledger::Direction;
use crate::market::RangeWindow;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// How the stop distance of an order is derived
#[derive(Debug, Clone, Copy)]
pub enum StopBasis<'a> {
    /// Fixed percentage of the entry price
    RiskPercent(Decimal),
    /// Distance to the opposite side of a sealed daily range
    Range(&'a RangeWindow),
}

impl Calculator {
    /// Stop-loss price `points` steps on the losing side of `entry`
    ///
    /// Zero means "no stop".
    pub fn stop_loss_price(
        &self,
        entry: Decimal,
        points: u32,
        tick_size: Decimal,
        direction: Direction,
        precision: u32,
    ) -> Decimal {
        if points == 0 || tick_size <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let distance = Decimal::from(points) * tick_size;
        let raw = match direction {
            Direction::Buy => entry - distance,
            Direction::Sell => entry + distance,
        };
        raw.round_dp(precision)
    }

    /// Take-profit price `points * ratio` steps on the winning side of `entry`
    ///
    /// Zero means "no target".
    pub fn take_profit_price(
        &self,
        entry: Decimal,
        points: u32,
        ratio: Decimal,
        tick_size: Decimal,
        direction: Direction,
        precision: u32,
    ) -> Decimal {
        if points == 0 || ratio <= Decimal::ZERO || tick_size <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let distance = Decimal::from(points) * ratio * tick_size;
        let raw = match direction {
            Direction::Buy => entry + distance,
            Direction::Sell => entry - distance,
        };
        raw.round_dp(precision)
    }

    /// Stop distance in whole price steps for an order at `price`
    pub fn stop_distance_points(
        &self,
        price: Decimal,
        tick_size: Decimal,
        direction: Direction,
        basis: StopBasis<'_>,
    ) -> u32 {
        if price <= Decimal::ZERO || tick_size <= Decimal::ZERO {
            return 0;
        }

        let distance = match basis {
            StopBasis::RiskPercent(pct) => {
                if pct <= Decimal::ZERO {
                    return 0;
                }
                price * pct / dec!(100)
            }
            StopBasis::Range(window) => {
                if !window.is_usable() {
                    return 0;
                }
                match direction {
                    Direction::Buy => price - window.low,
                    Direction::Sell => window.high - price,
                }
            }
        };

        if distance <= Decimal::ZERO {
            return 0;
        }
        let steps = (distance / tick_size).round();
        match steps.to_u32() {
            Some(points) => points,
            None => {
                tracing::warn!(%price, %tick_size, %steps, "Stop distance out of range, no stop set");
                0
            }
        }
    }
}
