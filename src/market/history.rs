//! Historical bar store backed by CSV files

use super::{Bar, MarketDataError};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bars per symbol, sorted by time
#[derive(Debug, Clone, Default)]
pub struct HistoricalMarket {
    bars: HashMap<String, Vec<Bar>>,
}

impl HistoricalMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `<dir>/<SYMBOL>.csv` for every symbol
    pub fn load_dir(dir: impl AsRef<Path>, symbols: &[String]) -> Result<Self, MarketDataError> {
        let mut market = Self::new();
        for symbol in symbols {
            let path = dir.as_ref().join(format!("{symbol}.csv"));
            if !path.exists() {
                return Err(MarketDataError::MissingSymbol(symbol.clone()));
            }
            let bars = Self::load_csv(&path)?;
            tracing::info!(symbol = %symbol, bars = bars.len(), "Loaded historical bars");
            market.insert(symbol, bars);
        }
        Ok(market)
    }

    /// Parse a `time,open,high,low,close[,volume]` file
    pub fn load_csv(path: &Path) -> Result<Vec<Bar>, MarketDataError> {
        let csv_err = |source| MarketDataError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;

        let mut bars = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(csv_err)?;
            let line = index + 2;
            let field = |i: usize, name: &str| {
                record.get(i).map(str::trim).ok_or_else(|| {
                    parse_error(path, line, format!("missing {name} column"))
                })
            };

            let time = NaiveDateTime::parse_from_str(field(0, "time")?, TIME_FORMAT)
                .map_err(|e| parse_error(path, line, format!("invalid time: {e}")))?;
            let decimal = |i: usize, name: &str| -> Result<Decimal, MarketDataError> {
                let raw = field(i, name)?;
                Decimal::from_str(raw)
                    .map_err(|e| parse_error(path, line, format!("invalid {name} value: {e}")))
            };

            let volume = match record.get(5).map(str::trim) {
                Some(raw) if !raw.is_empty() => Decimal::from_str(raw)
                    .map_err(|e| parse_error(path, line, format!("invalid volume value: {e}")))?,
                _ => Decimal::ZERO,
            };

            bars.push(Bar {
                time,
                open: decimal(1, "open")?,
                high: decimal(2, "high")?,
                low: decimal(3, "low")?,
                close: decimal(4, "close")?,
                volume,
            });
        }
        Ok(bars)
    }

    /// Register bars for `symbol`, replacing any previous series
    pub fn insert(&mut self, symbol: impl Into<String>, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.time);
        self.bars.insert(symbol.into(), bars);
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.bars.get(symbol).is_some_and(|bars| !bars.is_empty())
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }

    /// Latest bar at or before `at`
    pub fn bar_at(&self, symbol: &str, at: NaiveDateTime) -> Option<&Bar> {
        let bars = self.bars.get(symbol)?;
        let idx = bars.partition_point(|b| b.time <= at);
        idx.checked_sub(1).map(|i| &bars[i])
    }

    /// High and low over `[start_minute, end_minute)` of `day`
    pub fn high_low_range(
        &self,
        symbol: &str,
        day: NaiveDate,
        start_minute: u32,
        end_minute: u32,
    ) -> Option<(Decimal, Decimal)> {
        let bars = self.bars.get(symbol)?;
        let midnight = day.and_hms_opt(0, 0, 0)?;
        let start = midnight + Duration::minutes(i64::from(start_minute));
        let end = midnight + Duration::minutes(i64::from(end_minute));

        let from = bars.partition_point(|b| b.time < start);
        let to = bars.partition_point(|b| b.time < end);
        let window = bars.get(from..to)?;
        let high = window.iter().map(|b| b.high).max()?;
        let low = window.iter().map(|b| b.low).min()?;
        Some((high, low))
    }
}

fn parse_error(path: &Path, line: usize, reason: String) -> MarketDataError {
    MarketDataError::Parse {
        path: PathBuf::from(path),
        line,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIME_FORMAT).unwrap()
    }

    fn write_csv(dir: &Path, symbol: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(format!("{symbol}.csv"))).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    const BARS: &str = "time,open,high,low,close,volume
2024-03-04 08:00:00,1.1000,1.1010,1.0990,1.1005,120
2024-03-04 08:05:00,1.1005,1.1030,1.1000,1.1020,80
2024-03-04 08:10:00,1.1020,1.1025,1.0980,1.0985,95
2024-03-04 08:15:00,1.0985,1.0990,1.0970,1.0975,60
";

    #[test]
    fn test_load_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "EURUSD", BARS);

        let market = HistoricalMarket::load_dir(dir.path(), &["EURUSD".to_string()]).unwrap();
        assert!(market.has_symbol("EURUSD"));

        let bar = market.bar_at("EURUSD", at("2024-03-04 08:07:00")).unwrap();
        assert_eq!(bar.close, dec!(1.1020));
        assert!(market.bar_at("EURUSD", at("2024-03-04 07:59:00")).is_none());
    }

    #[test]
    fn test_missing_symbol_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = HistoricalMarket::load_dir(dir.path(), &["XAUUSD".to_string()]);
        assert!(matches!(result, Err(MarketDataError::MissingSymbol(s)) if s == "XAUUSD"));
    }

    #[test]
    fn test_bad_row_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "EURUSD",
            "time,open,high,low,close\n2024-03-04 08:00:00,1.1,abc,1.0,1.05\n",
        );
        let result = HistoricalMarket::load_csv(&dir.path().join("EURUSD.csv"));
        assert!(matches!(result, Err(MarketDataError::Parse { line: 2, .. })));
    }

    #[test]
    fn test_high_low_range() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "EURUSD", BARS);
        let market = HistoricalMarket::load_dir(dir.path(), &["EURUSD".to_string()]).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        // 08:00 up to (not including) 08:15
        let (high, low) = market.high_low_range("EURUSD", day, 480, 495).unwrap();
        assert_eq!(high, dec!(1.1030));
        assert_eq!(low, dec!(1.0980));

        assert!(market.high_low_range("EURUSD", day, 600, 660).is_none());
    }
}
