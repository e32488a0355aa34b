//! Engine gauges
//!
//! Values are emitted as structured debug events so any subscriber can pick
//! them up.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// One full evaluation cycle
    Cycle,
    /// Broker reconciliation pass
    Reconcile,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Account equity
    Equity,
    /// Realized account balance
    Balance,
    /// Equity minus begin-of-day balance
    DailyProfit,
    /// Equity minus begin-of-week balance
    WeeklyProfit,
    /// Open position count
    OpenPositions,
}

impl GaugeMetric {
    fn name(&self) -> &'static str {
        match self {
            GaugeMetric::Equity => "tradedesk_equity",
            GaugeMetric::Balance => "tradedesk_balance",
            GaugeMetric::DailyProfit => "tradedesk_daily_profit",
            GaugeMetric::WeeklyProfit => "tradedesk_weekly_profit",
            GaugeMetric::OpenPositions => "tradedesk_open_positions",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::Cycle => "tradedesk_cycle_duration_ms",
        LatencyMetric::Reconcile => "tradedesk_reconcile_duration_ms",
    };

    tracing::debug!(
        metric = metric_name,
        value_ms = duration.as_millis(),
        "Recording latency"
    );
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: Decimal) {
    let value = value.to_f64().unwrap_or_default();
    tracing::debug!(metric = metric.name(), value = value, "Setting gauge");
}
