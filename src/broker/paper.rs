//! Paper broker with simulated fills over historical bars

use super::{
    Account, BrokerDeal, CloseResult, Connector, OrderRequest, OrderResult, SymbolFeed,
    SymbolSpec, Trade,
};
use crate::calculator::Calculator;
use crate::clock::Clock;
use crate::ledger::{Direction, Ledger, PositionFilter, PositionRecord, PositionStatus};
use crate::market::HistoricalMarket;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct PaperPosition {
    symbol: String,
    direction: Direction,
    lot_size: Decimal,
    entry_price: Decimal,
}

const TICKET_PREFIX: &str = "sim-";

#[derive(Debug)]
struct PaperBook {
    next_ticket: u64,
    balance: Decimal,
    open: BTreeMap<String, PaperPosition>,
    closed: Vec<BrokerDeal>,
}

/// Paper broker
///
/// Fills every order at the close of the latest bar at or before the clock
/// (bid and ask are both the close). Tickets are sequential so identical runs
/// produce identical ledgers.
pub struct PaperBroker {
    market: Arc<HistoricalMarket>,
    clock: Arc<dyn Clock>,
    specs: HashMap<String, SymbolSpec>,
    calculator: Calculator,
    currency: String,
    leverage: Decimal,
    server_offset_hours: i64,
    book: RwLock<PaperBook>,
}

impl PaperBroker {
    /// Create a paper broker funded with `deposit`
    pub fn new(
        market: Arc<HistoricalMarket>,
        clock: Arc<dyn Clock>,
        specs: HashMap<String, SymbolSpec>,
        calculator: Calculator,
        deposit: Decimal,
    ) -> Self {
        Self {
            market,
            clock,
            specs,
            calculator,
            currency: "USD".to_string(),
            leverage: dec!(100),
            server_offset_hours: 0,
            book: RwLock::new(PaperBook {
                next_ticket: 1,
                balance: deposit,
                open: BTreeMap::new(),
                closed: vec![],
            }),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage;
        self
    }

    pub fn with_server_offset(mut self, hours: i64) -> Self {
        self.server_offset_hours = hours;
        self
    }

    /// Pick up where a previous run over `ledger` stopped
    ///
    /// Tickets continue above the highest paper ticket on record, open
    /// positions are re-booked at their entry price and the balance is the
    /// last one the risk snapshot observed.
    pub fn resume_from(mut self, ledger: &Ledger) -> Self {
        let book = self.book.get_mut();

        let highest = ledger
            .list_all()
            .iter()
            .filter_map(|r| r.ticket.strip_prefix(TICKET_PREFIX)?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        book.next_ticket = book.next_ticket.max(highest + 1);

        for record in ledger.list_open(PositionFilter::any()) {
            let Some(entry_price) = record.entry_price else {
                continue;
            };
            book.open.insert(
                record.ticket.clone(),
                PaperPosition {
                    symbol: record.symbol.clone(),
                    direction: record.direction,
                    lot_size: record.lot_size,
                    entry_price,
                },
            );
        }

        if let Some(daily) = &ledger.metadata().daily {
            book.balance = daily.balance;
        }

        tracing::info!(
            next_ticket = book.next_ticket,
            open = book.open.len(),
            balance = %book.balance,
            "Paper book resumed"
        );
        self
    }

    fn close_price(&self, symbol: &str) -> anyhow::Result<Decimal> {
        let now = self.clock.now();
        self.market
            .bar_at(symbol, now)
            .map(|bar| bar.close)
            .ok_or_else(|| anyhow!("No quote for {symbol} at {now}"))
    }

    fn spec_for(&self, symbol: &str) -> anyhow::Result<&SymbolSpec> {
        self.specs
            .get(symbol)
            .with_context(|| format!("Unknown symbol {symbol}"))
    }

    fn floating(&self, position: &PaperPosition) -> anyhow::Result<Decimal> {
        let spec = self.spec_for(&position.symbol)?;
        let price = self.close_price(&position.symbol)?;
        let record = Self::as_record("", position, None);
        let result = self
            .calculator
            .profit(&record, spec.valuation(Some(price)), false)?;
        Ok(result.profit)
    }

    fn as_record(ticket: &str, position: &PaperPosition, exit: Option<Decimal>) -> PositionRecord {
        PositionRecord {
            id: ticket.to_string(),
            ticket: ticket.to_string(),
            symbol: position.symbol.clone(),
            direction: position.direction,
            lot_size: position.lot_size,
            status: PositionStatus::Open,
            opened_at: Default::default(),
            strategy: String::new(),
            entry_price: Some(position.entry_price),
            exit_price: exit,
            exit_time: None,
            stop_loss: None,
            take_profit: None,
            stop_loss_points: None,
            commission: Decimal::ZERO,
            profit: Decimal::ZERO,
            slippage_entry: Decimal::ZERO,
            slippage_exit: Decimal::ZERO,
            comment: None,
        }
    }
}

#[async_trait]
impl Account for PaperBroker {
    async fn balance(&self) -> anyhow::Result<Decimal> {
        Ok(self.book.read().await.balance)
    }

    async fn equity(&self) -> anyhow::Result<Decimal> {
        let book = self.book.read().await;
        let mut equity = book.balance;
        for position in book.open.values() {
            equity += self.floating(position)?;
        }
        Ok(equity)
    }

    async fn free_margin(&self, _symbol: &str) -> anyhow::Result<Decimal> {
        let equity = self.equity().await?;
        let book = self.book.read().await;
        let mut used = Decimal::ZERO;
        for position in book.open.values() {
            let spec = self.spec_for(&position.symbol)?;
            used += position.lot_size * spec.contract_size * position.entry_price / self.leverage;
        }
        Ok(equity - used)
    }

    async fn margin_required(&self, order: &OrderRequest) -> anyhow::Result<Decimal> {
        let spec = self.spec_for(&order.symbol)?;
        let price = self.close_price(&order.symbol)?;
        Ok(order.lot_size * spec.contract_size * price / self.leverage)
    }

    async fn account_number(&self) -> anyhow::Result<String> {
        Ok("paper".to_string())
    }

    async fn currency(&self) -> anyhow::Result<String> {
        Ok(self.currency.clone())
    }

    async fn open_tickets(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.book.read().await.open.keys().cloned().collect())
    }

    async fn closed_deals(&self) -> anyhow::Result<Vec<BrokerDeal>> {
        Ok(self.book.read().await.closed.clone())
    }

    async fn server_offset_hours(&self) -> anyhow::Result<i64> {
        Ok(self.server_offset_hours)
    }

    async fn server_tick_timestamp(&self) -> anyhow::Result<Option<i64>> {
        let now = self.clock.now();
        let latest = self
            .market
            .symbols()
            .filter_map(|s| self.market.bar_at(s, now))
            .map(|bar| bar.time.and_utc().timestamp())
            .max();
        Ok(latest)
    }
}

#[async_trait]
impl SymbolFeed for PaperBroker {
    async fn ask(&self, symbol: &str) -> anyhow::Result<Decimal> {
        self.close_price(symbol)
    }

    async fn bid(&self, symbol: &str) -> anyhow::Result<Decimal> {
        self.close_price(symbol)
    }

    async fn prepare_symbol(&self, symbol: &str) -> anyhow::Result<bool> {
        Ok(self.specs.contains_key(symbol) && self.market.has_symbol(symbol))
    }

    async fn spec(&self, symbol: &str) -> anyhow::Result<SymbolSpec> {
        self.spec_for(symbol).cloned()
    }

    async fn high_low_range(
        &self,
        symbol: &str,
        day: NaiveDate,
        start_minute: u32,
        end_minute: u32,
    ) -> anyhow::Result<(Decimal, Decimal)> {
        self.market
            .high_low_range(symbol, day, start_minute, end_minute)
            .ok_or_else(|| anyhow!("No bars for {symbol} between minutes {start_minute} and {end_minute}"))
    }
}

#[async_trait]
impl Trade for PaperBroker {
    async fn open_position(&self, order: &OrderRequest) -> anyhow::Result<OrderResult> {
        if order.lot_size <= Decimal::ZERO {
            return Ok(OrderResult::rejected("Lot size must be positive"));
        }
        let price = self.close_price(&order.symbol)?;

        let mut book = self.book.write().await;
        let ticket = format!("{TICKET_PREFIX}{:06}", book.next_ticket);
        book.next_ticket += 1;
        book.open.insert(
            ticket.clone(),
            PaperPosition {
                symbol: order.symbol.clone(),
                direction: order.direction,
                lot_size: order.lot_size,
                entry_price: price,
            },
        );

        tracing::info!(
            ticket = %ticket,
            symbol = %order.symbol,
            direction = %order.direction,
            lots = %order.lot_size,
            price = %price,
            "Paper order filled"
        );

        Ok(OrderResult {
            accepted: true,
            ticket: Some(ticket),
            price: Some(price),
            message: None,
        })
    }

    async fn close_position(&self, record: &PositionRecord) -> anyhow::Result<CloseResult> {
        let mut book = self.book.write().await;
        let Some(position) = book.open.get(&record.ticket).cloned() else {
            return Ok(CloseResult::rejected(format!(
                "Ticket {} is not open",
                record.ticket
            )));
        };

        let exit_price = match record.exit_price {
            Some(price) => price,
            None => self.close_price(&position.symbol)?,
        };
        let spec = self.spec_for(&position.symbol)?;
        let closing = Self::as_record(&record.ticket, &position, Some(exit_price));
        let result = self.calculator.profit(&closing, spec.valuation(None), true)?;

        book.open.remove(&record.ticket);
        book.balance += result.net();
        book.closed.push(BrokerDeal {
            ticket: record.ticket.clone(),
            exit_price: Some(exit_price),
            exit_time: Some(self.clock.now()),
            profit: Some(result.profit),
            commission: Some(result.commission),
            slippage_entry: Some(result.slippage_entry),
            slippage_exit: Some(result.slippage_exit),
        });

        tracing::info!(
            ticket = %record.ticket,
            exit_price = %exit_price,
            profit = %result.profit,
            "Paper position closed"
        );

        Ok(CloseResult {
            accepted: true,
            exit_price: Some(exit_price),
            profit: Some(result),
            message: None,
        })
    }

    async fn modify_position(&self, _record: &mut PositionRecord) -> anyhow::Result<bool> {
        Ok(false)
    }
}

#[async_trait]
impl Connector for PaperBroker {
    async fn is_connected(&self) -> bool {
        true
    }

    async fn connect(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
