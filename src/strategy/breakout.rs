//! Range breakout strategy
//!
//! Watches the high/low of a configured morning window. Once the window has
//! closed the range is sealed for the day; a quote above the high opens a
//! buy, a quote below the low opens a sell. Positions are closed at the
//! asset's close minute, or as soon as the daily account target latches.

use super::{AssetConfig, SignalContext, Strategy, StrategyConfig};
use crate::ledger::{Direction, PositionRecord};
use crate::market::RangeWindow;
use anyhow::anyhow;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Smallest range, as a fraction of price, a restricted asset trades
const MIN_RANGE_FRACTION: Decimal = dec!(0.001);
/// Largest range, as a fraction of price, a restricted asset trades
const MAX_RANGE_FRACTION: Decimal = dec!(0.008);

pub struct BreakOut {
    config: StrategyConfig,
    ranges: HashMap<String, RangeWindow>,
}

impl BreakOut {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            ranges: HashMap::new(),
        }
    }
}

#[async_trait]
impl Strategy for BreakOut {
    fn config(&self) -> &StrategyConfig {
        &self.config
    }

    async fn refresh_ranges(&mut self, ctx: SignalContext<'_>) -> anyhow::Result<()> {
        let today = ctx.today();
        let now_min = ctx.minutes_since_midnight();
        let mut failed = vec![];

        for asset in &self.config.assets {
            let (Some(open_min), Some(close_min)) = (asset.range_open_min, asset.range_close_min)
            else {
                continue;
            };

            let window = self
                .ranges
                .entry(asset.symbol.clone())
                .or_insert_with(|| RangeWindow::new(&asset.symbol, today));
            if window.day != today {
                *window = RangeWindow::new(&asset.symbol, today);
            }
            if window.sealed || now_min < close_min {
                continue;
            }

            match ctx
                .feed
                .high_low_range(&asset.symbol, today, open_min, close_min)
                .await
            {
                Ok((high, low)) => {
                    window.seal(high, low);
                    tracing::info!(
                        symbol = %asset.symbol,
                        %high,
                        %low,
                        "Range sealed"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = self.config.strategy_name(),
                        symbol = %asset.symbol,
                        error = %e,
                        "Failed to compute range"
                    );
                    failed.push(asset.symbol.clone());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Range unavailable for {}", failed.join(", ")))
        }
    }

    fn range(&self, symbol: &str) -> Option<&RangeWindow> {
        self.ranges.get(symbol).filter(|w| w.sealed)
    }

    async fn entry_signal(
        &self,
        asset: &AssetConfig,
        ctx: SignalContext<'_>,
    ) -> anyhow::Result<Option<Direction>> {
        if ctx.target_reached() || ctx.has_reached_max_trades(self.name(), asset) {
            return Ok(None);
        }
        let now_min = ctx.minutes_since_midnight();
        if now_min < asset.open_min || now_min >= asset.close_min {
            return Ok(None);
        }
        let Some(window) = self
            .range(&asset.symbol)
            .filter(|w| w.day == ctx.today() && w.is_usable())
        else {
            return Ok(None);
        };

        let ask = ctx.feed.ask(&asset.symbol).await?;
        if ask <= Decimal::ZERO {
            return Ok(None);
        }
        if asset.range_size_restricted
            && !window.size_within(ask, MIN_RANGE_FRACTION, MAX_RANGE_FRACTION)
        {
            tracing::debug!(
                symbol = %asset.symbol,
                size = %window.size(),
                %ask,
                "Range size out of bounds"
            );
            return Ok(None);
        }

        let signal = if ask > window.high {
            Some(Direction::Buy)
        } else if ask < window.low {
            Some(Direction::Sell)
        } else {
            None
        };
        Ok(signal)
    }

    async fn exit_signal(
        &self,
        record: &PositionRecord,
        ctx: SignalContext<'_>,
    ) -> anyhow::Result<bool> {
        if ctx.target_reached() {
            return Ok(true);
        }
        Ok(self
            .config
            .asset(&record.symbol)
            .is_some_and(|asset| ctx.minutes_since_midnight() >= asset.close_min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{PaperBroker, SymbolSpec};
    use crate::calculator::Calculator;
    use crate::clock::{Clock, VirtualClock};
    use crate::ledger::{DailySnapshot, Ledger};
    use crate::market::{Bar, HistoricalMarket};
    use chrono::NaiveDateTime;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn bar(time: &str, high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar {
            time: at(time),
            open: close,
            high,
            low,
            close,
            volume: Decimal::ZERO,
        }
    }

    fn spec() -> SymbolSpec {
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

    fn range_asset(symbol: &str) -> AssetConfig {
        let mut asset = AssetConfig::new(symbol);
        asset.open_min = 9 * 60;
        asset.close_min = 20 * 60;
        asset.range_open_min = Some(8 * 60);
        asset.range_close_min = Some(9 * 60);
        asset
    }

    fn setup() -> (Arc<VirtualClock>, PaperBroker, BreakOut) {
        let mut market = HistoricalMarket::new();
        market.insert(
            "XAUUSD",
            vec![
                bar("2024-03-04 08:00:00", dec!(2010), dec!(1995), dec!(2000)),
                bar("2024-03-04 08:30:00", dec!(2020), dec!(1990), dec!(2005)),
                bar("2024-03-04 09:30:00", dec!(2025), dec!(2015), dec!(2025)),
                bar("2024-03-04 10:00:00", dec!(1989), dec!(1985), dec!(1985)),
            ],
        );
        let clock = Arc::new(VirtualClock::new(at("2024-03-04 08:00:00")));
        let broker = PaperBroker::new(
            Arc::new(market),
            clock.clone(),
            [
                ("XAUUSD".to_string(), spec()),
                ("XAGUSD".to_string(), spec()),
            ]
            .into_iter()
            .collect(),
            Calculator::default(),
            dec!(10000),
        );

        let config = StrategyConfig {
            kind: "break_out".into(),
            name: None,
            display_name: None,
            total_strategy_capital: dec!(10000),
            positioning: Default::default(),
            enabled: true,
            holidays: vec![],
            market_hours: Default::default(),
            assets: vec![range_asset("XAUUSD")],
        };
        (clock, broker, BreakOut::new(config))
    }

    #[tokio::test]
    async fn test_range_seals_after_window() {
        let (clock, broker, mut strategy) = setup();
        let ledger = Ledger::in_memory();

        clock.set(at("2024-03-04 08:45:00"));
        strategy
            .refresh_ranges(SignalContext::new(clock.as_ref(), &broker, &ledger))
            .await
            .unwrap();
        assert!(strategy.range("XAUUSD").is_none());

        clock.set(at("2024-03-04 09:00:00"));
        strategy
            .refresh_ranges(SignalContext::new(clock.as_ref(), &broker, &ledger))
            .await
            .unwrap();
        let window = strategy.range("XAUUSD").unwrap();
        assert_eq!(window.high, dec!(2020));
        assert_eq!(window.low, dec!(1990));
    }

    #[tokio::test]
    async fn test_breakout_direction() {
        let (clock, broker, mut strategy) = setup();
        let ledger = Ledger::in_memory();
        let asset = strategy.config().assets[0].clone();

        clock.set(at("2024-03-04 09:30:00"));
        let ctx = SignalContext::new(clock.as_ref(), &broker, &ledger);
        strategy.refresh_ranges(ctx).await.unwrap();
        assert_eq!(
            strategy.entry_signal(&asset, ctx).await.unwrap(),
            Some(Direction::Buy)
        );

        clock.set(at("2024-03-04 10:00:00"));
        let ctx = SignalContext::new(clock.as_ref(), &broker, &ledger);
        assert_eq!(
            strategy.entry_signal(&asset, ctx).await.unwrap(),
            Some(Direction::Sell)
        );
    }

    #[tokio::test]
    async fn test_failed_range_does_not_block_other_assets() {
        let (clock, broker, _) = setup();
        let ledger = Ledger::in_memory();
        let mut strategy = BreakOut::new(StrategyConfig {
            assets: vec![range_asset("XAGUSD"), range_asset("XAUUSD")],
            ..setup().2.config().clone()
        });

        clock.set(at("2024-03-04 09:30:00"));
        let err = strategy
            .refresh_ranges(SignalContext::new(clock.as_ref(), &broker, &ledger))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("XAGUSD"));
        assert!(strategy.range("XAGUSD").is_none());
        assert_eq!(strategy.range("XAUUSD").unwrap().high, dec!(2020));
    }

    #[tokio::test]
    async fn test_restricted_range_size() {
        let (clock, broker, _) = setup();
        let ledger = Ledger::in_memory();
        let mut asset = range_asset("XAUUSD");
        asset.range_size_restricted = true;
        let mut strategy = BreakOut::new(StrategyConfig {
            assets: vec![asset.clone()],
            ..setup().2.config().clone()
        });

        // range 1990..2020 is 30 wide; 0.8% of 2025 is 16.2
        clock.set(at("2024-03-04 09:30:00"));
        let ctx = SignalContext::new(clock.as_ref(), &broker, &ledger);
        strategy.refresh_ranges(ctx).await.unwrap();
        assert_eq!(strategy.entry_signal(&asset, ctx).await.unwrap(), None);

        asset.range_size_restricted = false;
        assert_eq!(
            strategy.entry_signal(&asset, ctx).await.unwrap(),
            Some(Direction::Buy)
        );
    }

    #[tokio::test]
    async fn test_no_entry_once_target_reached() {
        let (clock, broker, mut strategy) = setup();
        let mut ledger = Ledger::in_memory();
        let asset = strategy.config().assets[0].clone();

        clock.set(at("2024-03-04 09:30:00"));
        let now = clock.now();
        ledger
            .update_metadata(|m| {
                let mut daily = DailySnapshot::begin_day(now.date(), now, dec!(10000), None, true);
                daily.target_reached = true;
                m.daily = Some(daily);
            })
            .unwrap();

        let ctx = SignalContext::new(clock.as_ref(), &broker, &ledger);
        strategy.refresh_ranges(ctx).await.unwrap();
        assert_eq!(strategy.entry_signal(&asset, ctx).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_exit_at_close_minute() {
        let (clock, broker, strategy) = setup();
        let ledger = Ledger::in_memory();
        let record = PositionRecord {
            id: "1".into(),
            ticket: "1".into(),
            symbol: "XAUUSD".into(),
            direction: Direction::Buy,
            lot_size: dec!(0.05),
            status: crate::ledger::PositionStatus::Open,
            opened_at: at("2024-03-04 09:30:00"),
            strategy: "break_out".into(),
            entry_price: Some(dec!(2025)),
            exit_price: None,
            exit_time: None,
            stop_loss: None,
            take_profit: None,
            stop_loss_points: None,
            commission: Decimal::ZERO,
            profit: Decimal::ZERO,
            slippage_entry: Decimal::ZERO,
            slippage_exit: Decimal::ZERO,
            comment: None,
        };

        clock.set(at("2024-03-04 19:59:00"));
        let ctx = SignalContext::new(clock.as_ref(), &broker, &ledger);
        assert!(!strategy.exit_signal(&record, ctx).await.unwrap());

        clock.set(at("2024-03-04 20:00:00"));
        let ctx = SignalContext::new(clock.as_ref(), &broker, &ledger);
        assert!(strategy.exit_signal(&record, ctx).await.unwrap());
    }
}
