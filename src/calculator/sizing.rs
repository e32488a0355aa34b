//! Lot sizing

use super::{Calculator, VolumeLimits};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

impl Calculator {
    /// Lots that spend `capital` at the current ask
    ///
    /// Returns zero when any input is non-positive.
    pub fn size_by_capital(
        &self,
        capital: Decimal,
        ask: Decimal,
        contract_size: Decimal,
        limits: VolumeLimits,
    ) -> Decimal {
        if capital <= Decimal::ZERO || ask <= Decimal::ZERO || contract_size <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let raw = capital / (ask * contract_size);
        Self::clamp_lot(Self::round_lot(raw, limits.step), limits)
    }

    /// Lots that risk `risk_percent` of `capital` over `stop_points` price steps
    ///
    /// Returns zero when any input is non-positive.
    pub fn size_by_risk(
        &self,
        capital: Decimal,
        risk_percent: Decimal,
        stop_points: u32,
        tick_value: Decimal,
        limits: VolumeLimits,
    ) -> Decimal {
        if capital <= Decimal::ZERO
            || risk_percent <= Decimal::ZERO
            || stop_points == 0
            || tick_value <= Decimal::ZERO
        {
            return Decimal::ZERO;
        }

        let risk_amount = capital * risk_percent / dec!(100);
        let loss_per_lot = Decimal::from(stop_points) * tick_value;
        let raw = risk_amount / loss_per_lot;
        Self::clamp_lot(Self::round_lot(raw, limits.step), limits)
    }

    /// Round a raw lot to the precision implied by the volume step
    ///
    /// Whole-lot steps round to 0 dp, steps of 0.1 and above to 1 dp,
    /// anything finer to 2 dp.
    pub fn round_lot(raw: Decimal, step: Decimal) -> Decimal {
        let dp = if step == Decimal::ONE {
            0
        } else if step >= dec!(0.1) {
            1
        } else {
            2
        };
        raw.round_dp(dp)
    }

    /// Capital assigned to one asset of a strategy
    pub fn allocated_capital(strategy_capital: Decimal, percent_of_capital: Decimal) -> Decimal {
        if percent_of_capital <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        strategy_capital * percent_of_capital / dec!(100)
    }

    fn clamp_lot(lot: Decimal, limits: VolumeLimits) -> Decimal {
        lot.min(limits.max).max(limits.min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> VolumeLimits {
        VolumeLimits {
            min: dec!(0.01),
            max: dec!(50),
            step: dec!(0.01),
        }
    }

    #[test]
    fn test_size_by_capital() {
        let calc = Calculator::default();
        // 10000 / (1.1 * 100000) = 0.0909... -> 0.09
        let lot = calc.size_by_capital(dec!(10000), dec!(1.1), dec!(100000), limits());
        assert_eq!(lot, dec!(0.09));
    }

    #[test]
    fn test_size_by_capital_clamps() {
        let calc = Calculator::default();
        let tiny = calc.size_by_capital(dec!(1), dec!(2000), dec!(100), limits());
        assert_eq!(tiny, dec!(0.01));

        let huge = calc.size_by_capital(dec!(100000000), dec!(1), dec!(1), limits());
        assert_eq!(huge, dec!(50));
    }

    #[test]
    fn test_size_by_capital_bad_inputs() {
        let calc = Calculator::default();
        assert_eq!(
            calc.size_by_capital(dec!(1000), dec!(0), dec!(100), limits()),
            Decimal::ZERO
        );
        assert_eq!(
            calc.size_by_capital(dec!(1000), dec!(10), dec!(0), limits()),
            Decimal::ZERO
        );
        assert_eq!(
            calc.size_by_capital(dec!(0), dec!(10), dec!(100), limits()),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_size_by_risk() {
        let calc = Calculator::default();
        // risk = 10000 * 1% = 100; loss per lot = 200 * 1 = 200 -> 0.5
        let lot = calc.size_by_risk(dec!(10000), dec!(1), 200, dec!(1), limits());
        assert_eq!(lot, dec!(0.5));
    }

    #[test]
    fn test_size_by_risk_zero_points() {
        let calc = Calculator::default();
        assert_eq!(
            calc.size_by_risk(dec!(10000), dec!(1), 0, dec!(1), limits()),
            Decimal::ZERO
        );
        assert_eq!(
            calc.size_by_risk(dec!(10000), dec!(0), 100, dec!(1), limits()),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_round_lot_precision() {
        assert_eq!(Calculator::round_lot(dec!(2.6), dec!(1)), dec!(3));
        assert_eq!(Calculator::round_lot(dec!(0.27), dec!(0.1)), dec!(0.3));
        assert_eq!(Calculator::round_lot(dec!(0.276), dec!(0.01)), dec!(0.28));
        // midpoint rounds to even
        assert_eq!(Calculator::round_lot(dec!(0.125), dec!(0.01)), dec!(0.12));
    }

    #[test]
    fn test_lot_always_within_limits() {
        let calc = Calculator::default();
        let limits = VolumeLimits {
            min: dec!(0.1),
            max: dec!(5),
            step: dec!(0.1),
        };
        for capital in [dec!(1), dec!(500), dec!(25000), dec!(9000000)] {
            let lot = calc.size_by_capital(capital, dec!(1.25), dec!(1000), limits);
            assert!(lot >= limits.min && lot <= limits.max, "lot {lot} out of range");
        }
    }

    #[test]
    fn test_allocated_capital() {
        assert_eq!(
            Calculator::allocated_capital(dec!(20000), dec!(25)),
            dec!(5000)
        );
        assert_eq!(
            Calculator::allocated_capital(dec!(20000), dec!(0)),
            Decimal::ZERO
        );
    }
}
