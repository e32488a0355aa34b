//! Time sources
//!
//! Every time-sensitive component receives a [`Clock`] instead of reading the
//! system time directly. Live trading runs on [`WallClock`] shifted by the
//! broker server offset; backtests run on [`VirtualClock`], which the replay
//! driver advances one timestamp at a time.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of "now" for the trading engine
pub trait Clock: Send + Sync {
    /// Current time in broker server time
    fn now(&self) -> NaiveDateTime;

    /// Current trading day
    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Minutes elapsed since midnight of the current day
    fn minutes_since_midnight(&self) -> u32 {
        let now = self.now();
        now.hour() * 60 + now.minute()
    }
}

/// System clock shifted by the broker server offset
#[derive(Debug, Default)]
pub struct WallClock {
    offset_hours: AtomicI64,
}

impl WallClock {
    /// Create a wall clock with no server offset
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a wall clock with a fixed server offset
    pub fn with_offset(hours: i64) -> Self {
        Self {
            offset_hours: AtomicI64::new(hours),
        }
    }

    /// Update the server offset (hours ahead of UTC)
    pub fn set_offset_hours(&self, hours: i64) {
        self.offset_hours.store(hours, Ordering::SeqCst);
    }

    /// Current server offset in hours
    pub fn offset_hours(&self) -> i64 {
        self.offset_hours.load(Ordering::SeqCst)
    }
}

impl Clock for WallClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc() + Duration::hours(self.offset_hours())
    }
}

/// Manually advanced clock used by the backtest driver
#[derive(Debug)]
pub struct VirtualClock {
    /// Seconds since the Unix epoch
    seconds: AtomicI64,
}

impl VirtualClock {
    /// Create a virtual clock pinned at `start`
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            seconds: AtomicI64::new(start.and_utc().timestamp()),
        }
    }

    /// Move the clock to `at`
    pub fn set(&self, at: NaiveDateTime) {
        self.seconds.store(at.and_utc().timestamp(), Ordering::SeqCst);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> NaiveDateTime {
        let secs = self.seconds.load(Ordering::SeqCst);
        DateTime::from_timestamp(secs, 0)
            .map(|dt| dt.naive_utc())
            .unwrap_or_default()
    }
}
