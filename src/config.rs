//! Configuration types for tradedesk

use crate::backtest::Timeframe;
use crate::broker::SymbolSpec;
use crate::risk::AccountRiskThresholds;
use crate::strategy::{StrategyConfig, StrategyRegistry};
use crate::telemetry::LogFormat;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Account risk thresholds, re-read at every day rollover
    #[serde(default)]
    pub risk: AccountRiskThresholds,
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Contract specifications by symbol
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolSpec>,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
}

/// Cycle engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ledger document for live trading
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Sleep between live cycles
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Retention of closed positions in live mode
    #[serde(default = "default_prune_after_hours")]
    pub prune_after_hours: i64,
    /// Minimum time between two account risk evaluations
    #[serde(default = "default_risk_check_secs")]
    pub risk_check_secs: i64,
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    #[serde(default)]
    pub commission_per_lot: Decimal,
    #[serde(default)]
    pub slippage_per_lot: Decimal,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger.json")
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_prune_after_hours() -> i64 {
    24
}
fn default_risk_check_secs() -> i64 {
    60
}
fn default_reconnect_initial_ms() -> u64 {
    1000
}
fn default_reconnect_max_ms() -> u64 {
    60_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            interval_ms: default_interval_ms(),
            prune_after_hours: default_prune_after_hours(),
            risk_check_secs: default_risk_check_secs(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            commission_per_lot: Decimal::ZERO,
            slippage_per_lot: Decimal::ZERO,
        }
    }
}

/// Paper broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Directory holding `<SYMBOL>.csv` bar files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_deposit")]
    pub deposit: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
    /// Hours the broker server clock runs ahead of UTC
    #[serde(default)]
    pub server_offset_hours: i64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/history")
}
fn default_deposit() -> Decimal {
    Decimal::from(100_000)
}
fn default_currency() -> String {
    "USD".to_string()
}
fn default_leverage() -> Decimal {
    Decimal::ONE_HUNDRED
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            deposit: default_deposit(),
            currency: default_currency(),
            leverage: default_leverage(),
            server_offset_hours: 0,
        }
    }
}

/// Backtest configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// First replay day
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    /// Last replay day, inclusive
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub timeframe: Timeframe,
    /// Summary artifact, rewritten during and at the end of a run
    #[serde(default)]
    pub summary_path: Option<PathBuf>,
    /// Ledger document, truncated at start; kept in memory when unset
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

impl BacktestConfig {
    /// Replay bounds: from midnight of `date_from` to the last minute of `date_to`
    pub fn period(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let from = self.date_from?.and_time(NaiveTime::MIN);
        let to = self.date_to?.and_hms_opt(23, 59, 0)?;
        Some((from, to))
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Enabled strategies
    pub fn active_strategies(&self) -> impl Iterator<Item = &StrategyConfig> {
        self.strategies.iter().filter(|s| s.enabled)
    }

    /// Every symbol traded by an enabled strategy, sorted
    pub fn traded_symbols(&self) -> Vec<String> {
        let symbols: BTreeSet<&str> = self
            .active_strategies()
            .flat_map(|s| s.assets.iter().map(|a| a.symbol.as_str()))
            .collect();
        symbols.into_iter().map(str::to_string).collect()
    }

    /// Cross-check strategies against the registry and symbol table
    pub fn validate(&self, registry: &StrategyRegistry) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        for strategy in &self.strategies {
            let name = strategy.strategy_name();
            if !registry.contains(&strategy.kind) {
                return invalid(format!("unknown strategy kind '{}'", strategy.kind));
            }
            if strategy.total_strategy_capital < Decimal::ZERO {
                return invalid(format!("{name}: negative strategy capital"));
            }

            for asset in &strategy.assets {
                let symbol = &asset.symbol;
                if !self.symbols.contains_key(symbol) {
                    return invalid(format!("{name}: no [symbols.{symbol}] table"));
                }
                if asset.open_min > MINUTES_PER_DAY || asset.close_min > MINUTES_PER_DAY {
                    return invalid(format!("{name}/{symbol}: minute of day out of range"));
                }
                if asset.open_min >= asset.close_min {
                    return invalid(format!("{name}/{symbol}: open_min must precede close_min"));
                }
                match (asset.range_open_min, asset.range_close_min) {
                    (Some(open), Some(close)) if open >= close || close > MINUTES_PER_DAY => {
                        return invalid(format!("{name}/{symbol}: invalid range window"));
                    }
                    (Some(_), None) | (None, Some(_)) => {
                        return invalid(format!("{name}/{symbol}: incomplete range window"));
                    }
                    _ => {}
                }
                if asset.range_stop_loss && asset.range_open_min.is_none() {
                    return invalid(format!("{name}/{symbol}: range stop without range window"));
                }
            }
        }

        if let (Some(from), Some(to)) = (self.backtest.date_from, self.backtest.date_to) {
            if from > to {
                return invalid("backtest date_from is after date_to".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
        [engine]
        ledger_path = "state/ledger.json"
        interval_ms = 500

        [broker]
        deposit = 25000

        [risk]
        enabled = true
        take_profit = 500
        stop_loss = -300

        [backtest]
        date_from = "2024-03-04"
        date_to = "2024-03-08"
        timeframe = "M5"

        [telemetry]
        log_level = "debug"
        format = "json"

        [symbols.EURUSD]
        tick_size = 0.00001
        tick_value = 1
        contract_size = 100000
        precision = 5
        min_volume = 0.01
        max_volume = 50
        volume_step = 0.01

        [[strategies]]
        kind = "break_out"
        total_strategy_capital = 10000

        [strategies.market_hours]
        Monday = { open_time = "08:00", close_time = "22:00" }

        [[strategies.assets]]
        symbol = "EURUSD"
        open_min = 540
        close_min = 1260
        range_open_min = 480
        range_close_min = 540
    "#;

    #[test]
    fn test_config_deserialize() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.engine.ledger_path, PathBuf::from("state/ledger.json"));
        assert_eq!(config.engine.interval_ms, 500);
        assert_eq!(config.engine.prune_after_hours, 24);
        assert_eq!(config.broker.deposit, dec!(25000));
        assert_eq!(config.broker.currency, "USD");
        assert_eq!(config.risk.take_profit, Some(dec!(500)));
        assert_eq!(config.backtest.timeframe, Timeframe::M5);
        assert_eq!(config.telemetry.format, LogFormat::Json);
        assert_eq!(config.symbols["EURUSD"].precision, 5);
        assert_eq!(config.traded_symbols(), vec!["EURUSD".to_string()]);
        assert!(config.validate(&StrategyRegistry::builtin()).is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.interval_ms, 1000);
        assert_eq!(config.broker.deposit, dec!(100000));
        assert!(!config.risk.enabled);
        assert!(config.backtest.period().is_none());
        assert!(config.strategies.is_empty());
    }

    #[test]
    fn test_backtest_period() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let (from, to) = config.backtest.period().unwrap();
        assert_eq!(from.to_string(), "2024-03-04 00:00:00");
        assert_eq!(to.to_string(), "2024-03-08 23:59:00");
    }

    #[test]
    fn test_validate_unknown_kind() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.strategies[0].kind = "scalper".into();
        let err = config.validate(&StrategyRegistry::builtin()).unwrap_err();
        assert!(err.to_string().contains("scalper"));
    }

    #[test]
    fn test_validate_missing_symbol() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.symbols.clear();
        assert!(matches!(
            config.validate(&StrategyRegistry::builtin()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_range_window() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.strategies[0].assets[0].range_close_min = None;
        assert!(config.validate(&StrategyRegistry::builtin()).is_err());
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
