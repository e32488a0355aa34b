//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;
use tradedesk::broker::{LogNotifier, PaperBroker, SymbolSpec};
use tradedesk::cli::{build_engine, paper_broker, EngineParts};
use tradedesk::clock::VirtualClock;
use tradedesk::config::{BrokerConfig, Config, EngineConfig};
use tradedesk::engine::{CycleReport, Engine};
use tradedesk::ledger::Ledger;
use tradedesk::market::{Bar, HistoricalMarket, MarketHours, MarketSession};
use tradedesk::risk::{AccountRiskThresholds, StaticRiskLoader};
use tradedesk::strategy::{AssetConfig, Positioning, StrategyConfig, StrategyRegistry};

pub const GOLD: &str = "XAUUSD";
pub const SILVER: &str = "XAGUSD";
pub const DEPOSIT: Decimal = dec!(10000);

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// 0.01 price step worth 1.00 per lot
pub fn spec() -> SymbolSpec {
    SymbolSpec {
        tick_size: dec!(0.01),
        tick_value: dec!(1),
        contract_size: dec!(100),
        precision: 2,
        min_volume: dec!(0.01),
        max_volume: dec!(10),
        volume_step: dec!(0.01),
    }
}

pub fn flat_bar(time: &str, price: Decimal) -> Bar {
    Bar {
        time: at(time),
        open: price,
        high: price,
        low: price,
        close: price,
        volume: Decimal::ZERO,
    }
}

pub fn series(bars: &[(&str, Decimal)]) -> Vec<Bar> {
    bars.iter().map(|(t, p)| flat_bar(t, *p)).collect()
}

pub fn gold_market(bars: &[(&str, Decimal)]) -> HistoricalMarket {
    let mut market = HistoricalMarket::new();
    market.insert(GOLD, series(bars));
    market
}

/// Sessions covering the whole of every day
pub fn always_open() -> MarketHours {
    let session = MarketSession {
        open_time: chrono::NaiveTime::MIN,
        close_time: chrono::NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
    };
    let days = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];
    MarketHours {
        sessions: days.iter().map(|d| (d.to_string(), session)).collect(),
    }
}

/// `go_long` on `symbols` between two minutes of the day
pub fn go_long(name: &str, capital: Decimal, open_min: u32, close_min: u32, symbols: &[&str]) -> StrategyConfig {
    StrategyConfig {
        kind: "go_long".into(),
        name: Some(name.into()),
        display_name: None,
        total_strategy_capital: capital,
        positioning: Positioning::Capital,
        enabled: true,
        holidays: vec![],
        market_hours: always_open(),
        assets: symbols
            .iter()
            .map(|symbol| AssetConfig {
                open_min,
                close_min,
                ..AssetConfig::new(*symbol)
            })
            .collect(),
    }
}

pub fn config(strategies: Vec<StrategyConfig>, risk: AccountRiskThresholds) -> Config {
    Config {
        engine: EngineConfig::default(),
        broker: BrokerConfig {
            deposit: DEPOSIT,
            ..Default::default()
        },
        risk,
        symbols: BTreeMap::from([
            (GOLD.to_string(), spec()),
            (SILVER.to_string(), spec()),
        ]),
        strategies,
        ..Default::default()
    }
}

pub struct Harness {
    pub clock: Arc<VirtualClock>,
    pub broker: Arc<PaperBroker>,
    pub engine: Engine,
}

impl Harness {
    pub async fn new(config: &Config, market: HistoricalMarket, ledger: Ledger, start: &str) -> Self {
        let clock = Arc::new(VirtualClock::new(at(start)));
        let broker =
            Arc::new(paper_broker(config, Arc::new(market), clock.clone()).resume_from(&ledger));
        let mut engine = build_engine(
            config,
            &StrategyRegistry::builtin(),
            EngineParts {
                clock: clock.clone(),
                broker: broker.clone(),
                ledger,
                risk_loader: Box::new(StaticRiskLoader::new(config.risk.clone())),
                notifier: Arc::new(LogNotifier::new(clock.clone())),
            },
        )
        .unwrap();
        engine.initialize().await.unwrap();
        Self {
            clock,
            broker,
            engine,
        }
    }

    /// Move the clock to `ts` and run one cycle
    pub async fn cycle_at(&mut self, ts: &str) -> CycleReport {
        self.clock.set(at(ts));
        self.engine.run_cycle().await.unwrap()
    }
}
