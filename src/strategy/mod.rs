//! Strategies
//!
//! A strategy only decides *when* to enter or leave a position. Sizing,
//! gating, submission and bookkeeping go through the shared [`OrderDesk`].

mod breakout;
mod go_long;
mod protocol;
mod registry;
mod turnover;
mod types;

pub use breakout::BreakOut;
pub use go_long::GoLong;
pub use protocol::{has_reached_max_trades, ExitReason, OrderDesk, TriggerHit, TriggerKind};
pub use registry::StrategyRegistry;
pub use turnover::TurnoverTuesday;
pub use types::{AssetConfig, DeskError, Positioning, StrategyConfig, StrategyError};

use crate::broker::SymbolFeed;
use crate::clock::Clock;
use crate::ledger::{Direction, Ledger, PositionRecord};
use crate::market::RangeWindow;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Read-only view handed to signal logic
#[derive(Clone, Copy)]
pub struct SignalContext<'a> {
    pub clock: &'a dyn Clock,
    pub feed: &'a dyn SymbolFeed,
    pub ledger: &'a Ledger,
}

impl<'a> SignalContext<'a> {
    pub fn new(clock: &'a dyn Clock, feed: &'a dyn SymbolFeed, ledger: &'a Ledger) -> Self {
        Self {
            clock,
            feed,
            ledger,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.clock.minutes_since_midnight()
    }

    /// Daily account target (or stop) latched
    pub fn target_reached(&self) -> bool {
        self.ledger
            .metadata()
            .daily
            .as_ref()
            .is_some_and(|d| d.target_reached)
    }

    pub fn has_reached_max_trades(&self, strategy: &str, asset: &AssetConfig) -> bool {
        has_reached_max_trades(self.ledger, self.clock, strategy, asset)
    }
}

/// Signal logic of a concrete strategy
#[async_trait]
pub trait Strategy: Send + Sync {
    fn config(&self) -> &StrategyConfig;

    /// Name recorded on positions
    fn name(&self) -> &str {
        self.config().strategy_name()
    }

    /// Prepare every configured symbol
    async fn initialize(&mut self, ctx: SignalContext<'_>) -> anyhow::Result<()> {
        for asset in &self.config().assets {
            if !ctx.feed.prepare_symbol(&asset.symbol).await? {
                return Err(StrategyError::SymbolUnavailable(asset.symbol.clone()).into());
            }
        }
        Ok(())
    }

    /// Recompute range windows, once per cycle before any asset is evaluated
    async fn refresh_ranges(&mut self, _ctx: SignalContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Sealed range of `symbol` for today, if the strategy tracks one
    fn range(&self, _symbol: &str) -> Option<&RangeWindow> {
        None
    }

    /// Direction to enter on `asset`, if any
    async fn entry_signal(
        &self,
        asset: &AssetConfig,
        ctx: SignalContext<'_>,
    ) -> anyhow::Result<Option<Direction>>;

    /// Whether `record` should be closed now
    async fn exit_signal(
        &self,
        record: &PositionRecord,
        ctx: SignalContext<'_>,
    ) -> anyhow::Result<bool>;

    /// Called once after the last cycle
    fn finalize(&mut self) {}
}
