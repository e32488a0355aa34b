//! Replay timestamps

use super::BacktestError;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance between two replay timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn step(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        };
        f.write_str(s)
    }
}

impl FromStr for Timeframe {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            _ => Err(BacktestError::InvalidTimeframe(s.to_string())),
        }
    }
}

/// Every timestamp from `from` to `to` inclusive, `timeframe` apart
pub fn timeline(from: NaiveDateTime, to: NaiveDateTime, timeframe: Timeframe) -> Vec<NaiveDateTime> {
    let step = timeframe.step();
    let mut values = vec![];
    let mut current = from;
    while current <= to {
        values.push(current);
        current += step;
    }
    values
}

/// Reject empty or non-increasing timelines
pub fn validate(timestamps: &[NaiveDateTime]) -> Result<(), BacktestError> {
    if timestamps.is_empty() {
        return Err(BacktestError::EmptyTimeline);
    }
    match timestamps.windows(2).find(|w| w[1] <= w[0]) {
        Some(w) => Err(BacktestError::UnorderedTimeline(w[1])),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_timeline_inclusive() {
        let values = timeline(
            at("2024-03-04 00:00:00"),
            at("2024-03-04 02:00:00"),
            Timeframe::H1,
        );
        assert_eq!(values.len(), 3);
        assert_eq!(values[2], at("2024-03-04 02:00:00"));

        let days = timeline(at("2024-03-04 00:00:00"), at("2024-03-10 00:00:00"), Timeframe::D1);
        assert_eq!(days.len(), 7);
        assert!(timeline(at("2024-03-05 00:00:00"), at("2024-03-04 00:00:00"), Timeframe::M1).is_empty());
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("m15".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert_eq!(Timeframe::H4.to_string(), "H4");
        assert!(matches!(
            "W1".parse::<Timeframe>(),
            Err(BacktestError::InvalidTimeframe(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(matches!(validate(&[]), Err(BacktestError::EmptyTimeline)));

        let a = at("2024-03-04 00:00:00");
        let b = at("2024-03-04 00:01:00");
        assert!(validate(&[a, b]).is_ok());
        assert!(matches!(
            validate(&[a, b, b]),
            Err(BacktestError::UnorderedTimeline(t)) if t == b
        ));
    }
}
