//! Weekly turnover strategy
//!
//! Buys once per week on the open weekday after the open minute and holds
//! until the close minute of the close weekday.

use super::{AssetConfig, SignalContext, Strategy, StrategyConfig};
use crate::ledger::{Direction, PositionRecord};
use async_trait::async_trait;
use chrono::{Datelike, Weekday};

const DEFAULT_OPEN_DAY: Weekday = Weekday::Tue;
const DEFAULT_CLOSE_DAY: Weekday = Weekday::Wed;

pub struct TurnoverTuesday {
    config: StrategyConfig,
}

impl TurnoverTuesday {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Strategy for TurnoverTuesday {
    fn config(&self) -> &StrategyConfig {
        &self.config
    }

    async fn entry_signal(
        &self,
        asset: &AssetConfig,
        ctx: SignalContext<'_>,
    ) -> anyhow::Result<Option<Direction>> {
        if ctx.has_reached_max_trades(self.name(), asset) {
            return Ok(None);
        }
        let open_day = asset.open_day.unwrap_or(DEFAULT_OPEN_DAY);
        if ctx.today().weekday() != open_day || ctx.minutes_since_midnight() < asset.open_min {
            return Ok(None);
        }
        Ok(Some(Direction::Buy))
    }

    async fn exit_signal(
        &self,
        record: &PositionRecord,
        ctx: SignalContext<'_>,
    ) -> anyhow::Result<bool> {
        let Some(asset) = self.config.asset(&record.symbol) else {
            return Ok(false);
        };
        let close_day = asset.close_day.unwrap_or(DEFAULT_CLOSE_DAY);
        Ok(ctx.today().weekday() == close_day && ctx.minutes_since_midnight() >= asset.close_min)
    }
}
