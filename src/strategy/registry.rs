//! Name to constructor mapping for strategies

use super::{BreakOut, GoLong, Strategy, StrategyConfig, StrategyError, TurnoverTuesday};
use std::collections::BTreeMap;

/// Builds a strategy from its configuration
pub type StrategyConstructor = fn(StrategyConfig) -> Box<dyn Strategy>;

/// Registry of strategy kinds
#[derive(Clone)]
pub struct StrategyRegistry {
    constructors: BTreeMap<String, StrategyConstructor>,
}

impl StrategyRegistry {
    /// Registry without any strategies
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with every built-in strategy
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("break_out", break_out);
        registry.register("go_long", go_long);
        registry.register("turnover_tuesday", turnover_tuesday);
        registry
    }

    /// Add or replace a constructor
    pub fn register(&mut self, kind: impl Into<String>, constructor: StrategyConstructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn create(&self, config: StrategyConfig) -> Result<Box<dyn Strategy>, StrategyError> {
        let constructor = self
            .constructors
            .get(&config.kind)
            .ok_or_else(|| StrategyError::UnknownKind(config.kind.clone()))?;
        Ok(constructor(config))
    }
}

fn break_out(config: StrategyConfig) -> Box<dyn Strategy> {
    Box::new(BreakOut::new(config))
}

fn go_long(config: StrategyConfig) -> Box<dyn Strategy> {
    Box::new(GoLong::new(config))
}

fn turnover_tuesday(config: StrategyConfig) -> Box<dyn Strategy> {
    Box::new(TurnoverTuesday::new(config))
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
