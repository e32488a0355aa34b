//! Daily high/low range windows

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// High/low of one symbol over a configured intraday window
///
/// A window starts open on each trading day and is sealed once the window
/// has closed and its range is known. A sealed window never changes again
/// for that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeWindow {
    pub symbol: String,
    /// Day the window belongs to
    pub day: NaiveDate,
    pub high: Decimal,
    pub low: Decimal,
    /// Whether the range is final for the day
    pub sealed: bool,
}

impl RangeWindow {
    /// Empty, unsealed window for `day`
    pub fn new(symbol: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            day,
            high: Decimal::MIN,
            low: Decimal::MAX,
            sealed: false,
        }
    }

    /// Fix the range for the rest of the day
    pub fn seal(&mut self, high: Decimal, low: Decimal) {
        if self.sealed {
            return;
        }
        self.high = high;
        self.low = low;
        self.sealed = true;
    }

    /// Distance between high and low
    pub fn size(&self) -> Decimal {
        if !self.sealed {
            return Decimal::ZERO;
        }
        self.high - self.low
    }

    /// Whether the range spans between `min` and `max` as fractions of `price`
    pub fn size_within(&self, price: Decimal, min: Decimal, max: Decimal) -> bool {
        let size = self.size();
        size >= min * price && size <= max * price
    }

    /// Sealed with a positive, non-inverted range
    pub fn is_usable(&self) -> bool {
        self.sealed && self.low > Decimal::ZERO && self.high >= self.low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    #[test]
    fn test_new_window_is_unusable() {
        let w = RangeWindow::new("EURUSD", today());
        assert!(!w.sealed);
        assert!(!w.is_usable());
    }

    #[test]
    fn test_size_within_price_fraction() {
        let mut w = RangeWindow::new("XAUUSD", today());
        w.seal(dec!(2010), dec!(2000));
        assert_eq!(w.size(), dec!(10));
        // 0.1% .. 0.8% of 2000 is 2 .. 16
        assert!(w.size_within(dec!(2000), dec!(0.001), dec!(0.008)));
        assert!(!w.size_within(dec!(1000), dec!(0.001), dec!(0.008)));
        assert!(!w.size_within(dec!(20000), dec!(0.001), dec!(0.008)));
    }

    #[test]
    fn test_sealed_window_is_frozen() {
        let mut w = RangeWindow::new("EURUSD", today());
        w.seal(dec!(1.2), dec!(1.1));
        assert!(w.is_usable());

        w.seal(dec!(2), dec!(1));
        assert_eq!(w.high, dec!(1.2));
        assert_eq!(w.low, dec!(1.1));
    }
}
