//! Cycle engine
//!
//! One evaluation pass over every strategy and asset, shared by the live
//! loop ([`LiveRunner`]) and the backtest replay driver. Time is read only
//! from the injected clock.

mod live;
mod step;
mod types;

pub use live::{LiveRunner, LiveRunnerConfig};
pub use types::{CycleReport, EngineError, SkippedStep, Stage, StepError};

use crate::broker::Notifier;
use crate::clock::Clock;
use crate::reconcile::Reconciler;
use crate::ledger::{Ledger, LedgerEvent, PositionFilter};
use crate::risk::{RiskEvent, RiskGate};
use crate::strategy::{OrderDesk, SignalContext, Strategy, StrategyError};
use crate::telemetry::{record_latency, set_gauge, GaugeMetric, LatencyMetric};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;

/// Strategy evaluation engine
pub struct Engine {
    desk: OrderDesk,
    strategies: Vec<Box<dyn Strategy>>,
    risk: RiskGate,
    ledger: Ledger,
    notifier: Arc<dyn Notifier>,
    /// Retention of closed positions, `None` keeps everything
    prune_after_hours: Option<i64>,
    /// Balance seen by the previous cycle
    last_balance: Option<Decimal>,
}

impl Engine {
    pub fn new(
        desk: OrderDesk,
        strategies: Vec<Box<dyn Strategy>>,
        risk: RiskGate,
        ledger: Ledger,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            desk,
            strategies,
            risk,
            ledger,
            notifier,
            prune_after_hours: None,
            last_balance: None,
        }
    }

    /// Prune closed positions older than `hours` at the end of every cycle
    pub fn with_pruning(mut self, hours: i64) -> Self {
        self.prune_after_hours = Some(hours);
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn desk(&self) -> &OrderDesk {
        &self.desk
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn strategies(&self) -> impl Iterator<Item = &dyn Strategy> {
        self.strategies.iter().map(|s| &**s as &dyn Strategy)
    }

    /// Prepare every strategy's symbols
    pub async fn initialize(&mut self) -> Result<(), EngineError> {
        let ctx = SignalContext::new(self.desk.clock(), self.desk.feed(), &self.ledger);
        for strategy in &mut self.strategies {
            strategy.initialize(ctx).await.map_err(|e| {
                match e.downcast::<StrategyError>() {
                    Ok(err) => EngineError::Strategy(err),
                    Err(other) => EngineError::Broker(other),
                }
            })?;
            tracing::info!(strategy = strategy.name(), "Strategy initialized");
        }
        Ok(())
    }

    /// Let every strategy release its state
    pub fn finalize(&mut self) {
        for strategy in &mut self.strategies {
            strategy.finalize();
        }
    }

    /// Run one evaluation pass
    pub async fn run_cycle(&mut self) -> Result<CycleReport, EngineError> {
        let started = Instant::now();
        let now = self.desk.clock().now();
        let mut report = CycleReport::new(now);

        let outcome = self.update_risk(now).await;
        if let Some(events) = report.settle(outcome, Stage::Risk, None, None)? {
            report.risk_events = events;
        }

        let Self {
            desk,
            strategies,
            ledger,
            ..
        } = &mut *self;

        for strategy in strategies.iter_mut() {
            let config = strategy.config();
            if !config.enabled {
                continue;
            }
            if desk.is_holiday(config) || !desk.is_market_open(config) {
                tracing::trace!(strategy = strategy.name(), "Market closed");
                continue;
            }

            let ctx = SignalContext::new(desk.clock(), desk.feed(), ledger);
            let outcome = strategy
                .refresh_ranges(ctx)
                .await
                .map_err(|e| StepError::skip("range refresh", e));
            report.settle(outcome, Stage::Ranges, Some(strategy.name()), None)?;

            let strategy: &dyn Strategy = &**strategy;
            let name = strategy.name();
            for asset in &strategy.config().assets {
                let outcome = step::evaluate_entry(desk, ledger, strategy, asset).await;
                if let Some(Some(opened)) =
                    report.settle(outcome, Stage::Entry, Some(name), Some(&asset.symbol))?
                {
                    report.opened.push(opened);
                }

                let open = ledger.list_open(
                    PositionFilter::any().symbol(&asset.symbol).strategy(name),
                );
                for record in open {
                    let outcome = step::evaluate_exit(desk, ledger, strategy, &record).await;
                    if let Some(Some(closed)) =
                        report.settle(outcome, Stage::Exit, Some(name), Some(&asset.symbol))?
                    {
                        report.closed.push(closed);
                    }
                }
            }
        }

        if let Some(hours) = self.prune_after_hours {
            let removed = self.ledger.prune(now, hours)?;
            if removed > 0 {
                tracing::debug!(removed, "Pruned closed positions");
            }
        }

        set_gauge(
            GaugeMetric::OpenPositions,
            Decimal::from(self.ledger.list_open(PositionFilter::any()).len()),
        );
        record_latency(LatencyMetric::Cycle, started.elapsed());
        Ok(report)
    }

    /// Correct the ledger against the broker's open tickets and closed deals
    pub async fn reconcile(&mut self, reconciler: &Reconciler) -> Result<(), StepError> {
        let started = Instant::now();
        let account = self.desk.account();
        let open = account
            .open_tickets()
            .await
            .map_err(|e| StepError::skip("open tickets", e))?;
        let deals = account
            .closed_deals()
            .await
            .map_err(|e| StepError::skip("closed deals", e))?;

        let now = self.desk.clock().now();
        reconciler
            .sync_open_status(&mut self.ledger, &open, now)
            .await?;
        reconciler
            .sync_closed_details(&mut self.ledger, &deals)
            .await?;
        record_latency(LatencyMetric::Reconcile, started.elapsed());
        Ok(())
    }

    /// Refresh the floating profit stored on open positions
    pub async fn mark_to_market(&mut self) -> Result<usize, StepError> {
        Ok(self.desk.mark_to_market(&mut self.ledger).await?)
    }

    /// Day rollover and threshold evaluation
    async fn update_risk(&mut self, now: NaiveDateTime) -> Result<Vec<RiskEvent>, StepError> {
        let account = self.desk.account();
        let balance = account
            .balance()
            .await
            .map_err(|e| StepError::skip("balance", e))?;
        let equity = account
            .equity()
            .await
            .map_err(|e| StepError::skip("equity", e))?;

        let mut events = vec![];
        let today = now.date();
        let current_day = self.ledger.metadata().daily.as_ref().map(|d| d.day);
        if current_day != Some(today) {
            let begin = self.last_balance.unwrap_or(balance);
            events.extend(self.risk.roll_over(&mut self.ledger, today, now, begin)?);
        }
        self.last_balance = Some(balance);

        events.extend(self.risk.evaluate(&mut self.ledger, now, balance, equity)?);

        for event in &events {
            if event.blocks_entries() {
                tracing::warn!(%event, "New entries blocked");
            }
            let message = event.to_string();
            self.notifier
                .send_notification(&message, Some("Account risk"))
                .await;
            self.ledger.update_metadata(|m| {
                m.last_event = Some(LedgerEvent { at: now, message });
            })?;
        }

        set_gauge(GaugeMetric::Balance, balance);
        set_gauge(GaugeMetric::Equity, equity);
        if let Some(daily) = &self.ledger.metadata().daily {
            set_gauge(GaugeMetric::DailyProfit, equity - daily.begin_balance);
            set_gauge(GaugeMetric::WeeklyProfit, equity - daily.begin_balance_week);
        }
        Ok(events)
    }
}
