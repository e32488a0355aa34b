//! Order lifecycle shared by every strategy

use super::{AssetConfig, DeskError, Positioning, StrategyConfig};
use crate::broker::{Account, OrderRequest, SymbolFeed, Trade};
use crate::calculator::{Calculator, StopBasis};
use crate::clock::Clock;
use crate::ledger::{Direction, Ledger, PositionFilter, PositionRecord, PositionStatus};
use crate::market::RangeWindow;
use crate::risk::RiskGate;
use anyhow::anyhow;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Which protective level a price crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    StopLoss,
    TakeProfit,
}

/// A crossed stop-loss or take-profit level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerHit {
    pub kind: TriggerKind,
    /// The level that was crossed
    pub level: Decimal,
}

/// Why a position is being closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Strategy exit signal
    Signal,
    /// Stop-loss or take-profit crossed
    Trigger(TriggerHit),
}

impl ExitReason {
    fn comment(&self) -> &'static str {
        match self {
            ExitReason::Signal => "closed by signal",
            ExitReason::Trigger(_) => "stop/target hit",
        }
    }
}

/// Whether the strategy already holds its daily maximum of open positions on `asset`
pub fn has_reached_max_trades(
    ledger: &Ledger,
    clock: &dyn Clock,
    strategy: &str,
    asset: &AssetConfig,
) -> bool {
    let open = ledger.list_open(
        PositionFilter::any()
            .symbol(&asset.symbol)
            .strategy(strategy)
            .opened_on(clock.today()),
    );

    if let Some(total) = asset.max_total_trades {
        return open.len() >= total as usize;
    }

    [Direction::Buy, Direction::Sell].into_iter().any(|direction| {
        let count = open.iter().filter(|r| r.direction == direction).count();
        count > 0
            && asset
                .direction_cap(direction)
                .is_some_and(|cap| count >= cap as usize)
    })
}

/// Order desk: sizing, gating, submission and bookkeeping of positions
pub struct OrderDesk {
    clock: Arc<dyn Clock>,
    account: Arc<dyn Account>,
    feed: Arc<dyn SymbolFeed>,
    trader: Arc<dyn Trade>,
    calculator: Calculator,
}

impl OrderDesk {
    pub fn new(
        clock: Arc<dyn Clock>,
        account: Arc<dyn Account>,
        feed: Arc<dyn SymbolFeed>,
        trader: Arc<dyn Trade>,
        calculator: Calculator,
    ) -> Self {
        Self {
            clock,
            account,
            feed,
            trader,
            calculator,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn account(&self) -> &dyn Account {
        self.account.as_ref()
    }

    pub fn feed(&self) -> &dyn SymbolFeed {
        self.feed.as_ref()
    }

    pub fn calculator(&self) -> &Calculator {
        &self.calculator
    }

    pub fn is_holiday(&self, config: &StrategyConfig) -> bool {
        config.holidays.contains(&self.clock.today())
    }

    pub fn is_market_open(&self, config: &StrategyConfig) -> bool {
        config.market_hours.is_open(self.clock.now())
    }

    /// Build an order for `asset`, sized per the strategy's positioning mode
    pub async fn prepare_order(
        &self,
        config: &StrategyConfig,
        asset: &AssetConfig,
        direction: Direction,
        range: Option<&RangeWindow>,
    ) -> Result<OrderRequest, DeskError> {
        let spec = self.feed.spec(&asset.symbol).await?;
        let ask = self.feed.ask(&asset.symbol).await?;
        let price = match direction {
            Direction::Buy => ask,
            Direction::Sell => self.feed.bid(&asset.symbol).await?,
        };

        let capital =
            Calculator::allocated_capital(config.total_strategy_capital, asset.percent_of_capital);
        let risk_percent = asset.risk_percent.unwrap_or(Decimal::ZERO);

        let stop_loss_points = match (asset.range_stop_loss, range) {
            (true, Some(window)) => self.calculator.stop_distance_points(
                price,
                spec.tick_size,
                direction,
                StopBasis::Range(window),
            ),
            (true, None) => 0,
            (false, _) => self.calculator.stop_distance_points(
                price,
                spec.tick_size,
                direction,
                StopBasis::RiskPercent(risk_percent),
            ),
        };

        let lot_size = match config.positioning {
            Positioning::Capital => self.calculator.size_by_capital(
                capital,
                ask,
                spec.contract_size,
                spec.volume_limits(),
            ),
            Positioning::Risk => self.calculator.size_by_risk(
                capital,
                risk_percent,
                stop_loss_points,
                spec.tick_value,
                spec.volume_limits(),
            ),
        };

        Ok(OrderRequest {
            symbol: asset.symbol.clone(),
            direction,
            lot_size,
            capital,
            risk_percent: asset.risk_percent,
            stop_loss_points,
            reward_risk_ratio: asset.reward_risk_ratio,
            stop_loss: Decimal::ZERO,
            take_profit: Decimal::ZERO,
            strategy: config.strategy_name().to_string(),
            comment: Some(config.display_name().to_string()),
        })
    }

    /// Gate a prepared order
    ///
    /// Closed markets, holidays and a latched account target refuse outright.
    /// Daily caps come next, the broker margin check has the final say.
    pub async fn is_entry_allowed(
        &self,
        ledger: &Ledger,
        config: &StrategyConfig,
        asset: &AssetConfig,
        order: &OrderRequest,
    ) -> Result<bool, DeskError> {
        if self.is_holiday(config) || !self.is_market_open(config) {
            return Ok(false);
        }
        if RiskGate::entries_blocked(ledger) {
            tracing::debug!(symbol = %asset.symbol, "Entry refused: account target reached");
            return Ok(false);
        }

        let today = self.clock.today();
        let filter = PositionFilter::any()
            .symbol(&asset.symbol)
            .strategy(config.strategy_name());
        let opened = ledger.count_opened_today(today, filter);
        let opened_in_direction = ledger.count_opened_today(today, filter.direction(order.direction));
        if !asset.entry_cap_allows(order.direction, opened, opened_in_direction) {
            tracing::debug!(
                symbol = %asset.symbol,
                direction = %order.direction,
                opened,
                "Entry refused: daily trade cap"
            );
            return Ok(false);
        }

        Ok(self.account.has_sufficient_margin(order).await?)
    }

    /// Submit `order` and record the position if the broker accepts it
    pub async fn execute_entry(
        &self,
        ledger: &mut Ledger,
        mut order: OrderRequest,
    ) -> Result<Option<PositionRecord>, DeskError> {
        if order.lot_size <= Decimal::ZERO {
            tracing::debug!(symbol = %order.symbol, "Entry skipped: zero lot size");
            return Ok(None);
        }

        let spec = self.feed.spec(&order.symbol).await?;
        let entry_price = match order.direction {
            Direction::Buy => self.feed.ask(&order.symbol).await?,
            Direction::Sell => self.feed.bid(&order.symbol).await?,
        };
        order.stop_loss = self.calculator.stop_loss_price(
            entry_price,
            order.stop_loss_points,
            spec.tick_size,
            order.direction,
            spec.precision,
        );
        order.take_profit = self.calculator.take_profit_price(
            entry_price,
            order.stop_loss_points,
            order.reward_risk_ratio.unwrap_or(Decimal::ZERO),
            spec.tick_size,
            order.direction,
            spec.precision,
        );

        let result = self.trader.open_position(&order).await?;
        if !result.accepted {
            tracing::warn!(
                symbol = %order.symbol,
                reason = result.message.as_deref().unwrap_or("unknown"),
                "Order rejected"
            );
            return Ok(None);
        }
        let ticket = result
            .ticket
            .ok_or_else(|| anyhow!("Broker accepted order for {} without a ticket", order.symbol))?;

        let positive = |v: Decimal| (v > Decimal::ZERO).then_some(v);
        let record = PositionRecord {
            id: ticket.clone(),
            ticket,
            symbol: order.symbol.clone(),
            direction: order.direction,
            lot_size: order.lot_size,
            status: PositionStatus::Open,
            opened_at: self.clock.now(),
            strategy: order.strategy.clone(),
            entry_price: Some(result.price.unwrap_or(entry_price)),
            exit_price: None,
            exit_time: None,
            stop_loss: positive(order.stop_loss),
            take_profit: positive(order.take_profit),
            stop_loss_points: (order.stop_loss_points > 0).then_some(order.stop_loss_points),
            commission: Decimal::ZERO,
            profit: Decimal::ZERO,
            slippage_entry: Decimal::ZERO,
            slippage_exit: Decimal::ZERO,
            comment: order.comment.clone(),
        };

        ledger.upsert(record.clone())?;
        tracing::info!(
            id = %record.id,
            symbol = %record.symbol,
            direction = %record.direction,
            lots = %record.lot_size,
            strategy = %record.strategy,
            "Position opened"
        );
        Ok(Some(record))
    }

    pub fn is_exit_allowed(&self, config: &StrategyConfig) -> bool {
        !self.is_holiday(config) && self.is_market_open(config)
    }

    /// Close `record` and write the outcome back to the ledger
    ///
    /// For trigger exits the crossed level is requested as the exit price.
    pub async fn execute_exit(
        &self,
        ledger: &mut Ledger,
        record: &PositionRecord,
        reason: ExitReason,
    ) -> Result<Option<PositionRecord>, DeskError> {
        let mut closing = record.clone();
        if let ExitReason::Trigger(hit) = reason {
            closing.exit_price = Some(hit.level);
        }

        let result = self.trader.close_position(&closing).await?;
        if !result.accepted {
            tracing::warn!(
                id = %record.id,
                reason = result.message.as_deref().unwrap_or("unknown"),
                "Close rejected"
            );
            return Ok(None);
        }

        closing.status = PositionStatus::Closed;
        closing.exit_time = Some(self.clock.now());
        if let Some(price) = result.exit_price {
            closing.exit_price = Some(price);
        }
        if closing.exit_price.is_none() {
            closing.exit_price = Some(self.quote_for_exit(&closing).await?);
        }

        let valuation = match result.profit {
            Some(profit) => profit,
            None => {
                let spec = self.feed.spec(&closing.symbol).await?;
                self.calculator
                    .profit(&closing, spec.valuation(None), true)?
            }
        };
        closing.profit = valuation.profit;
        closing.commission = valuation.commission;
        closing.slippage_entry = valuation.slippage_entry;
        closing.slippage_exit = valuation.slippage_exit;
        closing.comment = Some(reason.comment().to_string());

        ledger.upsert(closing.clone())?;
        tracing::info!(
            id = %closing.id,
            symbol = %closing.symbol,
            profit = %closing.profit,
            reason = reason.comment(),
            "Position closed"
        );
        Ok(Some(closing))
    }

    /// Let the broker manage `record`, persisting only reported changes
    pub async fn manage_entry(
        &self,
        ledger: &mut Ledger,
        record: &PositionRecord,
    ) -> Result<bool, DeskError> {
        let mut managed = record.clone();
        let changed = self.trader.modify_position(&mut managed).await?;
        if changed {
            ledger.upsert(managed)?;
        }
        Ok(changed)
    }

    /// Check the protective levels of an open position
    ///
    /// Buys are checked against the bid, sells against the ask.
    pub async fn stop_or_target_hit(
        &self,
        record: &PositionRecord,
    ) -> Result<Option<TriggerHit>, DeskError> {
        if !record.is_open() {
            return Ok(None);
        }
        let stop = record.stop_loss.filter(|v| *v > Decimal::ZERO);
        let target = record.take_profit.filter(|v| *v > Decimal::ZERO);
        if stop.is_none() && target.is_none() {
            return Ok(None);
        }

        let hit = match record.direction {
            Direction::Buy => {
                let bid = self.feed.bid(&record.symbol).await?;
                match (stop, target) {
                    (Some(sl), _) if bid <= sl => Some((TriggerKind::StopLoss, sl)),
                    (_, Some(tp)) if bid >= tp => Some((TriggerKind::TakeProfit, tp)),
                    _ => None,
                }
            }
            Direction::Sell => {
                let ask = self.feed.ask(&record.symbol).await?;
                match (stop, target) {
                    (Some(sl), _) if ask >= sl => Some((TriggerKind::StopLoss, sl)),
                    (_, Some(tp)) if ask <= tp => Some((TriggerKind::TakeProfit, tp)),
                    _ => None,
                }
            }
        };

        Ok(hit.map(|(kind, level)| TriggerHit { kind, level }))
    }

    /// Refresh the stored floating profit of every open position
    pub async fn mark_to_market(&self, ledger: &mut Ledger) -> Result<usize, DeskError> {
        let mut updated = 0;
        for record in ledger.list_open(PositionFilter::any()) {
            let spec = self.feed.spec(&record.symbol).await?;
            let price = self.quote_for_exit(&record).await?;
            let valuation = self
                .calculator
                .profit(&record, spec.valuation(Some(price)), false)?;
            if valuation.profit != record.profit {
                let mut marked = record;
                marked.profit = valuation.profit;
                ledger.upsert(marked)?;
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Price a position would close at: bid for buys, ask for sells
    async fn quote_for_exit(&self, record: &PositionRecord) -> Result<Decimal, DeskError> {
        let price = match record.direction {
            Direction::Buy => self.feed.bid(&record.symbol).await?,
            Direction::Sell => self.feed.ask(&record.symbol).await?,
        };
        Ok(price)
    }
}
