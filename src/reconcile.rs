//! Broker reconciliation
//!
//! The broker is the source of truth for which positions exist and how they
//! were filled. The ledger is corrected towards it without ever discarding a
//! value the engine computed itself.

use crate::broker::{BrokerDeal, Notifier};
use crate::ledger::{Ledger, LedgerError, PositionFilter, PositionStatus};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const TITLE: &str = "Reconciliation";

/// Corrects the ledger against broker state
pub struct Reconciler {
    notifier: Arc<dyn Notifier>,
}

impl Reconciler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Close every open record whose ticket the broker no longer reports
    ///
    /// Returns the ids that were closed.
    pub async fn sync_open_status(
        &self,
        ledger: &mut Ledger,
        broker_open: &[String],
        now: NaiveDateTime,
    ) -> Result<Vec<String>, LedgerError> {
        let live: HashSet<&str> = broker_open.iter().map(String::as_str).collect();
        let mut closed = vec![];

        for mut record in ledger.list_open(PositionFilter::any()) {
            if live.contains(record.ticket.as_str()) {
                continue;
            }
            record.status = PositionStatus::Closed;
            record.exit_time = Some(now);
            record.comment = Some("closed externally".to_string());
            ledger.upsert(record.clone())?;

            let message = format!(
                "Position {} ({} {}) closed externally",
                record.ticket, record.direction, record.symbol
            );
            tracing::warn!(id = %record.id, ticket = %record.ticket, "Position closed externally");
            self.notifier.send_notification(&message, Some(TITLE)).await;
            closed.push(record.id);
        }

        Ok(closed)
    }

    /// Fill in close details the ledger is still missing
    ///
    /// Only empty fields are written: `None`, or zero where the broker
    /// reports a non-zero amount. Returns the ids that changed.
    pub async fn sync_closed_details(
        &self,
        ledger: &mut Ledger,
        deals: &[BrokerDeal],
    ) -> Result<Vec<String>, LedgerError> {
        let by_ticket: HashMap<&str, &BrokerDeal> =
            deals.iter().map(|d| (d.ticket.as_str(), d)).collect();
        let mut updated = vec![];

        for mut record in ledger.list_all() {
            let Some(deal) = by_ticket.get(record.ticket.as_str()) else {
                continue;
            };

            let mut changed = fill_option(&mut record.exit_price, deal.exit_price);
            changed |= fill_option(&mut record.exit_time, deal.exit_time);
            changed |= fill_amount(&mut record.profit, deal.profit);
            changed |= fill_amount(&mut record.commission, deal.commission);
            changed |= fill_amount(&mut record.slippage_entry, deal.slippage_entry);
            changed |= fill_amount(&mut record.slippage_exit, deal.slippage_exit);
            if !changed {
                continue;
            }

            ledger.upsert(record.clone())?;
            tracing::info!(id = %record.id, ticket = %record.ticket, "Backfilled close details");
            let message = format!(
                "Position {} ({}) updated from broker: profit {}",
                record.ticket, record.symbol, record.profit
            );
            self.notifier.send_notification(&message, Some(TITLE)).await;
            updated.push(record.id);
        }

        Ok(updated)
    }
}

fn fill_option<T>(local: &mut Option<T>, broker: Option<T>) -> bool {
    if local.is_some() || broker.is_none() {
        return false;
    }
    *local = broker;
    true
}

fn fill_amount(local: &mut Decimal, broker: Option<Decimal>) -> bool {
    match broker {
        Some(value) if local.is_zero() && !value.is_zero() => {
            *local = value;
            true
        }
        _ => false,
    }
}
