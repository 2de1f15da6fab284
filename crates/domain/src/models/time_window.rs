//! Report time window model.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error raised for an unsupported time filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid time filter: {0}")]
pub struct InvalidTimeFilter(pub String);

/// Unit of the look-back window applied to a report's query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilterUnit {
    Hour,
    Day,
    Month,
}

impl TimeFilterUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilterUnit::Hour => "hour",
            TimeFilterUnit::Day => "day",
            TimeFilterUnit::Month => "month",
        }
    }
}

impl fmt::Display for TimeFilterUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFilterUnit {
    type Err = InvalidTimeFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(TimeFilterUnit::Hour),
            "day" => Ok(TimeFilterUnit::Day),
            "month" => Ok(TimeFilterUnit::Month),
            other => Err(InvalidTimeFilter(format!("unknown unit {other}"))),
        }
    }
}

/// Closed `[start, end]` window a report run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window ending at `now` and reaching back `amount` units.
    ///
    /// Month subtraction is calendar-aware and clamps the day of month
    /// (March 31 minus one month is February 29 or 28).
    pub fn last(amount: u32, unit: TimeFilterUnit, now: DateTime<Utc>) -> Option<Self> {
        let start = match unit {
            TimeFilterUnit::Hour => now.checked_sub_signed(Duration::hours(i64::from(amount)))?,
            TimeFilterUnit::Day => now.checked_sub_signed(Duration::days(i64::from(amount)))?,
            TimeFilterUnit::Month => now.checked_sub_months(Months::new(amount))?,
        };
        Some(Self { start, end: now })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_filter_unit_from_str() {
        assert_eq!("hour".parse::<TimeFilterUnit>(), Ok(TimeFilterUnit::Hour));
        assert_eq!("day".parse::<TimeFilterUnit>(), Ok(TimeFilterUnit::Day));
        assert_eq!("month".parse::<TimeFilterUnit>(), Ok(TimeFilterUnit::Month));
        assert!("second".parse::<TimeFilterUnit>().is_err());
    }

    #[test]
    fn test_last_five_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
        let window = TimeWindow::last(5, TimeFilterUnit::Day, now).unwrap();
        assert_eq!(window.end, now);
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2024, 3, 5, 15, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_last_hours() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 1, 0, 0).unwrap();
        let window = TimeWindow::last(3, TimeFilterUnit::Hour, now).unwrap();
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2024, 3, 9, 22, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_last_month_clamps_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 8, 0, 0).unwrap();
        let window = TimeWindow::last(1, TimeFilterUnit::Month, now).unwrap();
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_last_months_across_year() {
        let now = Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap();
        let window = TimeWindow::last(3, TimeFilterUnit::Month, now).unwrap();
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2023, 11, 15, 0, 0, 0).unwrap()
        );
    }
}
