//! Telemetry module
//!
//! Structured logging and engine gauges

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{record_latency, set_gauge, GaugeMetric, LatencyMetric};

use crate::config::TelemetryConfig;

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level, config.format)
}
