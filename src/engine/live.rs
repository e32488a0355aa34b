//! Live polling loop

use super::{CycleReport, Engine, EngineError, Stage, StepError};
use crate::broker::Connector;
use crate::clock::{Clock, WallClock};
use crate::reconcile::Reconciler;
use std::sync::Arc;
use std::time::Duration;

/// Live loop settings
#[derive(Debug, Clone)]
pub struct LiveRunnerConfig {
    /// Sleep between two cycles
    pub interval: Duration,
    /// First reconnect delay, doubled after each failed attempt
    pub reconnect_initial: Duration,
    /// Upper bound on the reconnect delay
    pub reconnect_max: Duration,
}

impl Default for LiveRunnerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(60),
        }
    }
}

/// Runs the engine against a live broker until interrupted
pub struct LiveRunner {
    engine: Engine,
    connector: Arc<dyn Connector>,
    clock: Arc<WallClock>,
    reconciler: Reconciler,
    config: LiveRunnerConfig,
}

impl LiveRunner {
    pub fn new(
        engine: Engine,
        connector: Arc<dyn Connector>,
        clock: Arc<WallClock>,
        reconciler: Reconciler,
        config: LiveRunnerConfig,
    ) -> Self {
        Self {
            engine,
            connector,
            clock,
            reconciler,
            config,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Poll until Ctrl-C
    ///
    /// Interrupts are only honoured between cycles.
    pub async fn run(mut self) -> Result<(), EngineError> {
        self.engine.initialize().await?;
        tracing::info!(interval_ms = self.config.interval.as_millis(), "Live loop started");

        loop {
            if !self.connector.is_connected().await && !self.reconnect().await {
                break;
            }

            let report = self.tick().await?;
            if !report.is_idle() {
                tracing::info!(
                    opened = report.opened.len(),
                    closed = report.closed.len(),
                    skipped = report.skipped.len(),
                    "Cycle complete"
                );
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        self.engine.finalize();
        tracing::info!("Live loop stopped");
        Ok(())
    }

    /// One live cycle: clock sync, reconciliation, mark to market, evaluation
    pub async fn tick(&mut self) -> Result<CycleReport, EngineError> {
        let mut pre = CycleReport::new(self.clock.now());

        let outcome = self.sync_server_clock().await;
        pre.settle(outcome, Stage::Sync, None, None)?;
        let outcome = self.engine.reconcile(&self.reconciler).await;
        pre.settle(outcome, Stage::Sync, None, None)?;
        let outcome = self.engine.mark_to_market().await;
        pre.settle(outcome, Stage::Sync, None, None)?;

        let mut report = self.engine.run_cycle().await?;
        pre.skipped.append(&mut report.skipped);
        report.skipped = pre.skipped;
        Ok(report)
    }

    /// Reconnect with doubling backoff; `false` when interrupted
    async fn reconnect(&self) -> bool {
        let mut delay = self.config.reconnect_initial;
        loop {
            match self.connector.connect().await {
                Ok(()) => {
                    tracing::info!("Broker connection restored");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        retry_in_ms = delay.as_millis(),
                        "Broker connection failed"
                    );
                }
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(self.config.reconnect_max);
        }
    }

    /// Apply the broker clock offset
    ///
    /// The offset is re-read only when the broker's reference tick changed;
    /// otherwise the persisted offset is applied.
    async fn sync_server_clock(&mut self) -> Result<(), StepError> {
        let account = self.engine.desk().account();
        let tick = account
            .server_tick_timestamp()
            .await
            .map_err(|e| StepError::skip("server tick", e))?;
        let metadata = self.engine.ledger().metadata();

        if tick.is_some() && tick != metadata.last_tick {
            let offset = account
                .server_offset_hours()
                .await
                .map_err(|e| StepError::skip("server offset", e))?;
            if self.clock.offset_hours() != offset {
                tracing::info!(offset_hours = offset, "Broker clock offset updated");
            }
            self.clock.set_offset_hours(offset);
            self.engine.ledger_mut().update_metadata(|m| {
                m.server_offset_hours = Some(offset);
                m.last_tick = tick;
            })?;
        } else if let Some(offset) = metadata.server_offset_hours {
            self.clock.set_offset_hours(offset);
        }
        Ok(())
    }
}
