//! Engine wiring shared by the `run` and `backtest` commands

use crate::broker::{Notifier, PaperBroker};
use crate::calculator::Calculator;
use crate::clock::Clock;
use crate::config::Config;
use crate::engine::Engine;
use crate::ledger::Ledger;
use crate::market::HistoricalMarket;
use crate::risk::{RiskConfigLoader, RiskGate};
use crate::strategy::{OrderDesk, StrategyRegistry};
use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;

/// Collaborators an engine is assembled from
pub struct EngineParts {
    pub clock: Arc<dyn Clock>,
    pub broker: Arc<PaperBroker>,
    pub ledger: Ledger,
    pub risk_loader: Box<dyn RiskConfigLoader>,
    pub notifier: Arc<dyn Notifier>,
}

/// Load bars for every traded symbol from `broker.data_dir`
pub fn load_market(config: &Config) -> anyhow::Result<Arc<HistoricalMarket>> {
    let symbols = config.traded_symbols();
    let market = HistoricalMarket::load_dir(&config.broker.data_dir, &symbols)
        .with_context(|| format!("Failed to load bars from {}", config.broker.data_dir.display()))?;
    tracing::info!(
        symbols = symbols.len(),
        data_dir = %config.broker.data_dir.display(),
        "Historical data loaded"
    );
    Ok(Arc::new(market))
}

/// Paper broker funded per `[broker]`
pub fn paper_broker(
    config: &Config,
    market: Arc<HistoricalMarket>,
    clock: Arc<dyn Clock>,
) -> PaperBroker {
    PaperBroker::new(
        market,
        clock,
        config.symbols.clone().into_iter().collect(),
        calculator(config),
        config.broker.deposit,
    )
    .with_currency(config.broker.currency.clone())
    .with_leverage(config.broker.leverage)
    .with_server_offset(config.broker.server_offset_hours)
}

fn calculator(config: &Config) -> Calculator {
    Calculator::new(config.engine.commission_per_lot, config.engine.slippage_per_lot)
}

/// Assemble an engine running every enabled strategy
pub fn build_engine(
    config: &Config,
    registry: &StrategyRegistry,
    parts: EngineParts,
) -> anyhow::Result<Engine> {
    let EngineParts {
        clock,
        broker,
        ledger,
        risk_loader,
        notifier,
    } = parts;

    let desk = OrderDesk::new(
        clock,
        broker.clone(),
        broker.clone(),
        broker,
        calculator(config),
    );

    let strategies = config
        .active_strategies()
        .map(|s| registry.create(s.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    let risk = RiskGate::new(risk_loader)?
        .with_check_interval(Duration::seconds(config.engine.risk_check_secs));

    tracing::info!(strategies = strategies.len(), "Engine assembled");
    Ok(Engine::new(desk, strategies, risk, ledger, notifier))
}
