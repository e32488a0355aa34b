//! Strategy configuration and errors

use crate::calculator::CalculatorError;
use crate::ledger::{Direction, LedgerError};
use crate::market::MarketHours;
use chrono::{NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// How order volume is derived
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Positioning {
    /// Spend the allocated capital at the current ask
    #[default]
    Capital,
    /// Risk a percentage of the allocated capital over the stop distance
    Risk,
}

/// Per-asset trading parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    /// Minute of day after which entries are allowed
    #[serde(default)]
    pub open_min: u32,
    /// Minute of day at which positions are closed
    #[serde(default)]
    pub close_min: u32,
    /// Daily buy cap, ignored when `max_total_trades` is set
    ///
    /// Defaults to 1. A negative value in the file leaves buys uncapped.
    #[serde(
        default = "default_direction_cap",
        deserialize_with = "deserialize_cap",
        serialize_with = "serialize_cap"
    )]
    pub max_buy_trades: Option<u32>,
    /// Daily sell cap, same rules as `max_buy_trades`
    #[serde(
        default = "default_direction_cap",
        deserialize_with = "deserialize_cap",
        serialize_with = "serialize_cap"
    )]
    pub max_sell_trades: Option<u32>,
    /// Daily cap over both directions
    #[serde(default)]
    pub max_total_trades: Option<u32>,
    /// Share of the strategy capital assigned to this asset, in percent
    #[serde(default = "default_percent_of_capital")]
    pub percent_of_capital: Decimal,
    /// Percent of price (stop distance) or of capital (risk sizing)
    #[serde(default)]
    pub risk_percent: Option<Decimal>,
    #[serde(default)]
    pub range_open_min: Option<u32>,
    #[serde(default)]
    pub range_close_min: Option<u32>,
    /// Place the stop at the far side of the daily range
    #[serde(default)]
    pub range_stop_loss: bool,
    #[serde(default)]
    pub reward_risk_ratio: Option<Decimal>,
    /// Only trade ranges spanning 0.1% to 0.8% of the price
    #[serde(default)]
    pub range_size_restricted: bool,
    /// Weekday entries are allowed on, for weekly strategies
    #[serde(default)]
    pub open_day: Option<Weekday>,
    /// Weekday positions are closed on, for weekly strategies
    #[serde(default)]
    pub close_day: Option<Weekday>,
}

fn default_direction_cap() -> Option<u32> {
    Some(1)
}

fn deserialize_cap<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let cap = i64::deserialize(deserializer)?;
    if cap < 0 {
        return Ok(None);
    }
    u32::try_from(cap)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

fn serialize_cap<S>(cap: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match cap {
        Some(cap) => serializer.serialize_i64(i64::from(*cap)),
        None => serializer.serialize_i64(-1),
    }
}
fn default_percent_of_capital() -> Decimal {
    Decimal::ONE_HUNDRED
}
fn default_true() -> bool {
    true
}

impl AssetConfig {
    /// Create an asset with default caps and full capital allocation
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            open_min: 0,
            close_min: 0,
            max_buy_trades: default_direction_cap(),
            max_sell_trades: default_direction_cap(),
            max_total_trades: None,
            percent_of_capital: default_percent_of_capital(),
            risk_percent: None,
            range_open_min: None,
            range_close_min: None,
            range_stop_loss: false,
            reward_risk_ratio: None,
            range_size_restricted: false,
            open_day: None,
            close_day: None,
        }
    }

    /// Daily cap for one direction
    pub fn direction_cap(&self, direction: Direction) -> Option<u32> {
        match direction {
            Direction::Buy => self.max_buy_trades,
            Direction::Sell => self.max_sell_trades,
        }
    }

    /// Whether another entry fits under the daily caps
    ///
    /// A total cap takes precedence over direction caps. A direction cap of
    /// zero forbids that direction.
    pub fn entry_cap_allows(
        &self,
        direction: Direction,
        opened_today: usize,
        opened_today_in_direction: usize,
    ) -> bool {
        if let Some(total) = self.max_total_trades {
            return opened_today < total as usize;
        }
        match self.direction_cap(direction) {
            Some(cap) => opened_today_in_direction < cap as usize,
            None => true,
        }
    }
}

/// Configuration of one strategy instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Registry key selecting the signal logic
    pub kind: String,
    /// Name recorded on positions, defaults to `kind`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub total_strategy_capital: Decimal,
    #[serde(default)]
    pub positioning: Positioning,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Days without trading
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    #[serde(default)]
    pub market_hours: MarketHours,
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

impl StrategyConfig {
    /// Name recorded on positions
    pub fn strategy_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }

    /// Human readable label
    pub fn display_name(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.strategy_name())
    }

    pub fn asset(&self, symbol: &str) -> Option<&AssetConfig> {
        self.assets.iter().find(|a| a.symbol == symbol)
    }
}

/// Strategy setup errors
#[derive(Debug, Error)]
pub enum StrategyError {
    /// No constructor registered for a kind
    #[error("Unknown strategy kind: {0}")]
    UnknownKind(String),
    /// A configured symbol cannot be traded
    #[error("Symbol {0} is not available")]
    SymbolUnavailable(String),
}

/// Order-lifecycle errors
#[derive(Debug, Error)]
pub enum DeskError {
    /// Broker call failed or returned unusable data
    #[error(transparent)]
    Broker(#[from] anyhow::Error),
    /// Valuation failed on a record
    #[error(transparent)]
    Calculator(#[from] CalculatorError),
    /// The ledger could not be written
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_cap_takes_precedence() {
        let asset = AssetConfig {
            max_total_trades: Some(2),
            max_buy_trades: Some(0),
            ..AssetConfig::new("EURUSD")
        };
        assert!(asset.entry_cap_allows(Direction::Buy, 1, 1));
        assert!(!asset.entry_cap_allows(Direction::Buy, 2, 0));
    }

    #[test]
    fn test_direction_caps() {
        let asset = AssetConfig {
            max_buy_trades: Some(0),
            max_sell_trades: Some(2),
            ..AssetConfig::new("EURUSD")
        };
        assert!(!asset.entry_cap_allows(Direction::Buy, 0, 0));
        assert!(asset.entry_cap_allows(Direction::Sell, 1, 1));
        assert!(!asset.entry_cap_allows(Direction::Sell, 2, 2));

        let uncapped = AssetConfig {
            max_buy_trades: None,
            ..AssetConfig::new("EURUSD")
        };
        assert!(uncapped.entry_cap_allows(Direction::Buy, 50, 50));
    }

    #[test]
    fn test_strategy_config_defaults() {
        let config: StrategyConfig = toml::from_str(
            r#"
            kind = "break_out"
            total_strategy_capital = 50000
            holidays = ["2024-12-25"]

            [[assets]]
            symbol = "XAUUSD"
            open_min = 540
            close_min = 1200
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy_name(), "break_out");
        assert_eq!(config.display_name(), "break_out");
        assert_eq!(config.positioning, Positioning::Capital);
        assert!(config.enabled);
        assert_eq!(
            config.holidays,
            vec![NaiveDate::from_ymd_opt(2024, 12, 25).unwrap()]
        );

        let asset = config.asset("XAUUSD").unwrap();
        assert_eq!(asset.max_buy_trades, Some(1));
        assert_eq!(asset.percent_of_capital, Decimal::ONE_HUNDRED);
        assert!(!asset.range_stop_loss);
    }

    #[test]
    fn test_negative_direction_cap_means_uncapped() {
        let asset: AssetConfig = toml::from_str(
            r#"
            symbol = "SPX500"
            max_buy_trades = -1
            max_sell_trades = 3
            open_day = "Tue"
            "#,
        )
        .unwrap();
        assert_eq!(asset.max_buy_trades, None);
        assert_eq!(asset.max_sell_trades, Some(3));
        assert_eq!(asset.open_day, Some(Weekday::Tue));
        assert!(asset.entry_cap_allows(Direction::Buy, 10, 10));

        let written = toml::to_string(&asset).unwrap();
        assert!(written.contains("max_buy_trades = -1"));
        let back: AssetConfig = toml::from_str(&written).unwrap();
        assert_eq!(back, asset);
    }
}
