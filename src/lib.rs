//! tradedesk: strategy cycle engine with a persistent position ledger
//!
//! This library provides the core components for:
//! - A durable position ledger with daily account snapshots
//! - Account risk gating on daily targets, weekly goals and stop levels
//! - Lot sizing, stop/target levels and profit valuation
//! - An order lifecycle protocol shared by every strategy
//! - Reconciliation of the ledger against the broker's view
//! - Live and backtest drivers over the same cycle engine
//! - A paper broker replaying historical bars
//! - Structured logging

pub mod backtest;
pub mod broker;
pub mod calculator;
pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod market;
pub mod reconcile;
pub mod risk;
pub mod strategy;
pub mod telemetry;
