//! Buy-and-hold-for-the-day strategy

use super::{AssetConfig, SignalContext, Strategy, StrategyConfig};
use crate::ledger::{Direction, PositionRecord};
use async_trait::async_trait;

/// Buys once the open minute has passed and closes at the close minute
pub struct GoLong {
    config: StrategyConfig,
}

impl GoLong {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Strategy for GoLong {
    fn config(&self) -> &StrategyConfig {
        &self.config
    }

    async fn entry_signal(
        &self,
        asset: &AssetConfig,
        ctx: SignalContext<'_>,
    ) -> anyhow::Result<Option<Direction>> {
        let now_min = ctx.minutes_since_midnight();
        let in_window = now_min >= asset.open_min && now_min < asset.close_min;
        if !in_window || ctx.has_reached_max_trades(self.name(), asset) {
            return Ok(None);
        }
        Ok(Some(Direction::Buy))
    }

    async fn exit_signal(
        &self,
        record: &PositionRecord,
        ctx: SignalContext<'_>,
    ) -> anyhow::Result<bool> {
        Ok(self
            .config
            .asset(&record.symbol)
            .is_some_and(|asset| ctx.minutes_since_midnight() >= asset.close_min))
    }
}
