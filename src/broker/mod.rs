//! Broker capability traits
//!
//! The engine talks to a broker terminal only through these narrow traits.
//! [`PaperBroker`] implements all of them over historical bars and backs both
//! the backtest driver and the paper-trading loop.

mod notify;
mod paper;
mod types;

pub use notify::LogNotifier;
pub use paper::PaperBroker;
pub use types::{BrokerDeal, CloseResult, OrderRequest, OrderResult, SymbolSpec};

use crate::ledger::PositionRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Account balances, margin and broker-side position state
#[async_trait]
pub trait Account: Send + Sync {
    async fn balance(&self) -> anyhow::Result<Decimal>;
    async fn equity(&self) -> anyhow::Result<Decimal>;
    /// Margin still available for new positions in `symbol`
    async fn free_margin(&self, symbol: &str) -> anyhow::Result<Decimal>;
    /// Margin the broker would reserve for `order`
    async fn margin_required(&self, order: &OrderRequest) -> anyhow::Result<Decimal>;
    /// Final approval for a new entry
    async fn has_sufficient_margin(&self, order: &OrderRequest) -> anyhow::Result<bool> {
        let free = self.free_margin(&order.symbol).await?;
        let required = self.margin_required(order).await?;
        Ok(free >= required)
    }
    async fn account_number(&self) -> anyhow::Result<String>;
    async fn currency(&self) -> anyhow::Result<String>;
    /// Tickets of positions the broker still holds open
    async fn open_tickets(&self) -> anyhow::Result<Vec<String>>;
    /// Closed deals from broker history
    async fn closed_deals(&self) -> anyhow::Result<Vec<BrokerDeal>>;
    /// Server clock offset from UTC in hours
    async fn server_offset_hours(&self) -> anyhow::Result<i64>;
    /// Timestamp of the latest server tick, if one is available
    async fn server_tick_timestamp(&self) -> anyhow::Result<Option<i64>>;
}

/// Quotes and contract specifications
#[async_trait]
pub trait SymbolFeed: Send + Sync {
    async fn ask(&self, symbol: &str) -> anyhow::Result<Decimal>;
    async fn bid(&self, symbol: &str) -> anyhow::Result<Decimal>;
    /// Make `symbol` tradeable, returning whether it is available
    async fn prepare_symbol(&self, symbol: &str) -> anyhow::Result<bool>;
    async fn spec(&self, symbol: &str) -> anyhow::Result<SymbolSpec>;
    /// High and low of `symbol` between two minutes of `day`
    async fn high_low_range(
        &self,
        symbol: &str,
        day: NaiveDate,
        start_minute: u32,
        end_minute: u32,
    ) -> anyhow::Result<(Decimal, Decimal)>;
}

/// Order routing
#[async_trait]
pub trait Trade: Send + Sync {
    async fn open_position(&self, order: &OrderRequest) -> anyhow::Result<OrderResult>;
    /// Close `record`; a preset exit price is honoured as the requested fill
    async fn close_position(&self, record: &PositionRecord) -> anyhow::Result<CloseResult>;
    /// Apply broker-side management, returning whether anything changed
    async fn modify_position(&self, record: &mut PositionRecord) -> anyhow::Result<bool>;
}

/// Terminal connectivity
#[async_trait]
pub trait Connector: Send + Sync {
    async fn is_connected(&self) -> bool;
    async fn connect(&self) -> anyhow::Result<()>;
}

/// Fire-and-forget operator notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_notification(&self, message: &str, title: Option<&str>);
}
