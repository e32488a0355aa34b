//! Run command implementation

use super::setup::{build_engine, load_market, paper_broker, EngineParts};
use crate::broker::LogNotifier;
use crate::clock::WallClock;
use crate::config::Config;
use crate::engine::{LiveRunner, LiveRunnerConfig};
use crate::ledger::Ledger;
use crate::reconcile::Reconciler;
use crate::risk::{RiskConfigLoader, StaticRiskLoader, TomlRiskLoader};
use crate::strategy::StrategyRegistry;
use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Ledger document, overrides `engine.ledger_path`
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Milliseconds between cycles, overrides `engine.interval_ms`
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config, config_path: &Path) -> anyhow::Result<()> {
        let registry = StrategyRegistry::builtin();
        config.validate(&registry)?;

        let clock = Arc::new(WallClock::with_offset(config.broker.server_offset_hours));
        let market = load_market(config)?;
        let ledger_path = self
            .ledger
            .clone()
            .unwrap_or_else(|| config.engine.ledger_path.clone());
        let ledger = Ledger::open(&ledger_path)
            .with_context(|| format!("Failed to open ledger {}", ledger_path.display()))?;
        tracing::info!(
            path = %ledger_path.display(),
            positions = ledger.len(),
            "Ledger loaded"
        );
        let broker = Arc::new(paper_broker(config, market, clock.clone()).resume_from(&ledger));

        let risk_loader: Box<dyn RiskConfigLoader> = if config_path.exists() {
            Box::new(TomlRiskLoader::new(config_path))
        } else {
            Box::new(StaticRiskLoader::new(config.risk.clone()))
        };
        let notifier = Arc::new(LogNotifier::new(clock.clone()));

        let engine = build_engine(
            config,
            &registry,
            EngineParts {
                clock: clock.clone(),
                broker: broker.clone(),
                ledger,
                risk_loader,
                notifier: notifier.clone(),
            },
        )?
        .with_pruning(config.engine.prune_after_hours);

        let runner_config = LiveRunnerConfig {
            interval: Duration::from_millis(self.interval_ms.unwrap_or(config.engine.interval_ms)),
            reconnect_initial: Duration::from_millis(config.engine.reconnect_initial_ms),
            reconnect_max: Duration::from_millis(config.engine.reconnect_max_ms),
        };
        let runner = LiveRunner::new(engine, broker, clock, Reconciler::new(notifier), runner_config);
        runner.run().await?;
        Ok(())
    }
}
