//! Account risk thresholds and their loaders

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Account-level profit thresholds, expressed relative to the begin-of-day
/// (or begin-of-week) balance
///
/// A threshold left unset is never checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountRiskThresholds {
    /// Master switch
    #[serde(default)]
    pub enabled: bool,
    /// Daily stop as a signed profit delta, normally negative
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    /// Daily profit target
    #[serde(default)]
    pub take_profit: Option<Decimal>,
    /// Daily profit that arms the break-even ratchet
    #[serde(default)]
    pub break_even: Option<Decimal>,
    /// Stop level applied once break-even is reached
    #[serde(default)]
    pub post_break_even_stop: Option<Decimal>,
    /// Weekly profit target
    #[serde(default)]
    pub weekly_take_profit: Option<Decimal>,
}

impl AccountRiskThresholds {
    /// Raise the stop to `level`, never lowering it
    pub fn ratchet_stop(&mut self, level: Decimal) {
        self.stop_loss = Some(match self.stop_loss {
            Some(current) => current.max(level),
            None => level,
        });
    }
}

/// Source of account risk thresholds, consulted at startup and every day rollover
pub trait RiskConfigLoader: Send + Sync {
    fn load(&self) -> anyhow::Result<AccountRiskThresholds>;
}

/// Loader returning fixed thresholds
#[derive(Debug, Clone, Default)]
pub struct StaticRiskLoader {
    thresholds: AccountRiskThresholds,
}

impl StaticRiskLoader {
    pub fn new(thresholds: AccountRiskThresholds) -> Self {
        Self { thresholds }
    }
}

impl RiskConfigLoader for StaticRiskLoader {
    fn load(&self) -> anyhow::Result<AccountRiskThresholds> {
        Ok(self.thresholds.clone())
    }
}

/// Loader that re-reads the `[risk]` table of a TOML file on every call
#[derive(Debug, Clone)]
pub struct TomlRiskLoader {
    path: PathBuf,
}

#[derive(Deserialize)]
struct RiskSection {
    #[serde(default)]
    risk: AccountRiskThresholds,
}

impl TomlRiskLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RiskConfigLoader for TomlRiskLoader {
    fn load(&self) -> anyhow::Result<AccountRiskThresholds> {
        let content = std::fs::read_to_string(&self.path)?;
        let section: RiskSection = toml::from_str(&content)?;
        Ok(section.risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ratchet_only_raises() {
        let mut t = AccountRiskThresholds {
            stop_loss: Some(dec!(-200)),
            ..Default::default()
        };
        t.ratchet_stop(dec!(20));
        assert_eq!(t.stop_loss, Some(dec!(20)));

        t.ratchet_stop(dec!(-50));
        assert_eq!(t.stop_loss, Some(dec!(20)));

        let mut unset = AccountRiskThresholds::default();
        unset.ratchet_stop(dec!(5));
        assert_eq!(unset.stop_loss, Some(dec!(5)));
    }

    #[test]
    fn test_toml_loader_rereads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[risk]\nenabled = true\ntake_profit = 500\n").unwrap();

        let loader = TomlRiskLoader::new(&path);
        let first = loader.load().unwrap();
        assert!(first.enabled);
        assert_eq!(first.take_profit, Some(dec!(500)));
        assert_eq!(first.stop_loss, None);

        std::fs::write(&path, "[risk]\nenabled = true\ntake_profit = 750\n").unwrap();
        assert_eq!(loader.load().unwrap().take_profit, Some(dec!(750)));
    }

    #[test]
    fn test_toml_loader_missing_file() {
        let loader = TomlRiskLoader::new("/nonexistent/risk.toml");
        assert!(loader.load().is_err());
    }
}
