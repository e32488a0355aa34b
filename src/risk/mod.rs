//! Account risk gate
//!
//! Tracks begin-of-day and begin-of-week balances and latches the daily
//! target, break-even and weekly target flags. Flags only clear at the next
//! day (or week) rollover.

mod thresholds;
mod types;

pub use thresholds::{AccountRiskThresholds, RiskConfigLoader, StaticRiskLoader, TomlRiskLoader};
pub use types::{RiskError, RiskEvent};

use crate::ledger::{DailySnapshot, Ledger};
use anyhow::Context;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// Account-level risk state machine
pub struct RiskGate {
    loader: Box<dyn RiskConfigLoader>,
    thresholds: AccountRiskThresholds,
    check_interval: Duration,
    last_check: Option<NaiveDateTime>,
}

impl RiskGate {
    /// Create a gate, loading the initial thresholds
    pub fn new(loader: Box<dyn RiskConfigLoader>) -> Result<Self, RiskError> {
        let thresholds = Self::load(loader.as_ref())?;
        Ok(Self {
            loader,
            thresholds,
            check_interval: Duration::seconds(60),
            last_check: None,
        })
    }

    /// Override the minimum time between two evaluations
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    fn load(loader: &dyn RiskConfigLoader) -> Result<AccountRiskThresholds, RiskError> {
        loader
            .load()
            .context("Failed to load account risk thresholds")
            .map_err(RiskError::Loader)
    }

    /// Thresholds currently in force
    pub fn thresholds(&self) -> &AccountRiskThresholds {
        &self.thresholds
    }

    /// Whether the persisted snapshot currently refuses new entries
    pub fn entries_blocked(ledger: &Ledger) -> bool {
        ledger
            .metadata()
            .daily
            .as_ref()
            .is_some_and(DailySnapshot::entries_blocked)
    }

    /// Start trading day `day`
    ///
    /// Re-loads thresholds (dropping any break-even ratchet), snapshots the
    /// balance and resets the daily flags. The week restarts when `day` lies
    /// in a different ISO week than the previous snapshot.
    pub fn roll_over(
        &mut self,
        ledger: &mut Ledger,
        day: NaiveDate,
        now: NaiveDateTime,
        balance: Decimal,
    ) -> Result<Vec<RiskEvent>, RiskError> {
        self.thresholds = Self::load(self.loader.as_ref())?;
        self.last_check = None;

        let previous = ledger.metadata().daily.clone();
        let new_week = previous
            .as_ref()
            .map_or(true, |p| p.day.iso_week() != day.iso_week());
        let snapshot = DailySnapshot::begin_day(day, now, balance, previous.as_ref(), new_week);

        let mut events = vec![RiskEvent::NewDay {
            begin_balance: snapshot.begin_balance,
        }];
        if new_week {
            events.push(RiskEvent::NewWeek {
                begin_balance: snapshot.begin_balance_week,
            });
        }

        tracing::info!(
            %day,
            begin_balance = %snapshot.begin_balance,
            begin_balance_week = %snapshot.begin_balance_week,
            new_week,
            "Day rollover"
        );

        ledger.update_metadata(|m| {
            m.daily = Some(snapshot);
            m.last_event = None;
        })?;
        Ok(events)
    }

    /// Re-evaluate thresholds against the latest balance and equity
    ///
    /// Runs at most once per check interval; earlier calls are no-ops.
    pub fn evaluate(
        &mut self,
        ledger: &mut Ledger,
        now: NaiveDateTime,
        balance: Decimal,
        equity: Decimal,
    ) -> Result<Vec<RiskEvent>, RiskError> {
        if let Some(last) = self.last_check {
            if now - last < self.check_interval {
                return Ok(vec![]);
            }
        }
        let Some(mut snapshot) = ledger.metadata().daily.clone() else {
            return Ok(vec![]);
        };
        self.last_check = Some(now);

        snapshot.observe(now, balance, equity);
        let events = self.apply_thresholds(&mut snapshot);

        for event in &events {
            tracing::info!(%event, "Account risk transition");
        }

        ledger.update_metadata(|m| m.daily = Some(snapshot))?;
        Ok(events)
    }

    fn apply_thresholds(&mut self, snapshot: &mut DailySnapshot) -> Vec<RiskEvent> {
        let mut events = vec![];
        if !self.thresholds.enabled {
            return events;
        }

        let daily = snapshot.profit_floating;

        if snapshot.break_even_reached {
            // restore the ratchet after a restart within the same day
            if let Some(level) = self.thresholds.post_break_even_stop {
                self.thresholds.ratchet_stop(level);
            }
        } else if snapshot.begin_balance > Decimal::ZERO {
            if let Some(break_even) = self.thresholds.break_even {
                if daily >= break_even {
                    snapshot.break_even_reached = true;
                    if let Some(level) = self.thresholds.post_break_even_stop {
                        self.thresholds.ratchet_stop(level);
                    }
                    events.push(RiskEvent::BreakEvenReached {
                        stop: self.thresholds.stop_loss.unwrap_or(Decimal::ZERO),
                    });
                }
            }
        }

        if !snapshot.target_reached {
            if self.thresholds.take_profit.is_some_and(|tp| daily >= tp) {
                snapshot.target_reached = true;
                events.push(RiskEvent::TakeProfitReached { profit: daily });
            } else if self.thresholds.stop_loss.is_some_and(|sl| daily <= sl) {
                snapshot.target_reached = true;
                events.push(RiskEvent::StopLossReached { profit: daily });
            }
        }

        if !snapshot.weekly_profit_reached {
            let weekly = snapshot.profit_total_week;
            if self
                .thresholds
                .weekly_take_profit
                .is_some_and(|target| weekly >= target)
            {
                snapshot.weekly_profit_reached = true;
                events.push(RiskEvent::WeeklyTargetReached { profit: weekly });
            }
        }

        events
    }
}
