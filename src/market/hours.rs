//! Trading sessions per weekday

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Opening and closing time of one trading day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSession {
    #[serde(with = "hhmm")]
    pub open_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub close_time: NaiveTime,
}

impl MarketSession {
    /// Whether `time` falls inside the session, both ends inclusive
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.open_time <= time && time <= self.close_time
    }
}

/// Sessions keyed by English weekday name ("Monday" .. "Sunday")
///
/// Days without a session are closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketHours {
    pub sessions: BTreeMap<String, MarketSession>,
}

impl MarketHours {
    /// Whether the market is open at `now`
    pub fn is_open(&self, now: NaiveDateTime) -> bool {
        let day = now.format("%A").to_string();
        self.sessions
            .get(&day)
            .is_some_and(|session| session.contains(now.time()))
    }
}

mod hhmm {
    use super::*;

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn weekday_hours() -> MarketHours {
        toml::from_str(
            r#"
            Monday = { open_time = "08:00", close_time = "17:30" }
            Tuesday = { open_time = "08:00", close_time = "17:30" }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_session_bounds_inclusive() {
        let hours = weekday_hours();
        // 2024-03-04 is a Monday
        assert!(hours.is_open(at("2024-03-04 08:00:00")));
        assert!(hours.is_open(at("2024-03-04 17:30:00")));
        assert!(!hours.is_open(at("2024-03-04 07:59:00")));
        assert!(!hours.is_open(at("2024-03-04 17:31:00")));
    }

    #[test]
    fn test_missing_day_is_closed() {
        let hours = weekday_hours();
        // Wednesday has no session
        assert!(!hours.is_open(at("2024-03-06 12:00:00")));
        assert!(!MarketHours::default().is_open(at("2024-03-04 12:00:00")));
    }

    #[test]
    fn test_invalid_time_rejected() {
        let result: Result<MarketHours, _> =
            toml::from_str(r#"Monday = { open_time = "8am", close_time = "17:30" }"#);
        assert!(result.is_err());
    }
}
