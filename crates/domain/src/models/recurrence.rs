//! Recurrence domain model.
//!
//! A report's firing pattern is derived from its `(duration, durationUnit)`
//! pair. The derivation is a fixed policy that mirrors a six-field cron
//! expression (`sec min hour day-of-month month day-of-week`) evaluated in UTC:
//!
//! | unit     | cron                  | fires                                        |
//! |----------|-----------------------|----------------------------------------------|
//! | `second` | `*/N * * * * *`       | every second of the minute divisible by N    |
//! | `hour`   | `0 0 0/N * * *`       | top of the hour, hours 0, N, 2N, ...         |
//! | `day`    | `0 0 12 1/1 * *`      | daily at 12:00, N is ignored                 |
//! | `month`  | `0 0 12 1 1/N *`      | 12:00 on the 1st of months 1, 1+N, 1+2N, ... |

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hour of day (UTC) at which daily and monthly reports fire.
pub const REPORT_FIRE_HOUR: u32 = 12;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

/// Errors raised when a recurrence cannot be derived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRecurrence {
    #[error("Unknown recurrence unit: {0}")]
    UnknownUnit(String),

    #[error("Recurrence amount must be a positive integer")]
    ZeroAmount,
}

/// Unit of a report's recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    Second,
    Hour,
    Day,
    Month,
}

impl RecurrenceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceUnit::Second => "second",
            RecurrenceUnit::Hour => "hour",
            RecurrenceUnit::Day => "day",
            RecurrenceUnit::Month => "month",
        }
    }
}

impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceUnit {
    type Err = InvalidRecurrence;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "second" => Ok(RecurrenceUnit::Second),
            "hour" => Ok(RecurrenceUnit::Hour),
            "day" => Ok(RecurrenceUnit::Day),
            "month" => Ok(RecurrenceUnit::Month),
            other => Err(InvalidRecurrence::UnknownUnit(other.to_string())),
        }
    }
}

/// Firing pattern of a scheduled report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecurrenceSchedule {
    /// Seconds of each minute divisible by the step.
    EverySeconds(u32),
    /// Top of each hour of the day divisible by the step.
    EveryHours(u32),
    /// Once a day at the given hour.
    Daily { hour: u32 },
    /// The 1st of every `every`-th month (counting from January) at the given hour.
    Monthly { every: u32, hour: u32 },
}

impl RecurrenceSchedule {
    /// Derives the schedule for an `(amount, unit)` pair.
    ///
    /// `Day` ignores `amount`: a day-unit report always fires once daily.
    pub fn new(amount: u32, unit: RecurrenceUnit) -> Result<Self, InvalidRecurrence> {
        if amount == 0 {
            return Err(InvalidRecurrence::ZeroAmount);
        }

        Ok(match unit {
            RecurrenceUnit::Second => RecurrenceSchedule::EverySeconds(amount),
            RecurrenceUnit::Hour => RecurrenceSchedule::EveryHours(amount),
            RecurrenceUnit::Day => RecurrenceSchedule::Daily {
                hour: REPORT_FIRE_HOUR,
            },
            RecurrenceUnit::Month => RecurrenceSchedule::Monthly {
                every: amount,
                hour: REPORT_FIRE_HOUR,
            },
        })
    }

    /// Derives the schedule from an untyped unit name.
    pub fn parse(amount: u32, unit: &str) -> Result<Self, InvalidRecurrence> {
        Self::new(amount, unit.parse()?)
    }

    /// Equivalent six-field cron expression.
    pub fn cron_expression(&self) -> String {
        match self {
            RecurrenceSchedule::EverySeconds(step) => format!("*/{} * * * * *", step),
            RecurrenceSchedule::EveryHours(step) => format!("0 0 0/{} 1/1 * *", step),
            RecurrenceSchedule::Daily { hour } => format!("0 0 {} 1/1 * *", hour),
            RecurrenceSchedule::Monthly { every, hour } => {
                format!("0 0 {} 1 1/{} *", hour, every)
            }
        }
    }

    /// Returns the first fire instant strictly after `after`.
    ///
    /// Returns `None` only when the next instant falls outside the
    /// representable calendar range.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let ts = after.timestamp();

        match *self {
            RecurrenceSchedule::EverySeconds(step) => {
                let minute_start = ts - ts.rem_euclid(SECONDS_PER_MINUTE);
                let current = i64::from(after.second());
                let candidate = (current / i64::from(step) + 1) * i64::from(step);
                if candidate < SECONDS_PER_MINUTE {
                    from_timestamp(minute_start + candidate)
                } else {
                    from_timestamp(minute_start + SECONDS_PER_MINUTE)
                }
            }
            RecurrenceSchedule::EveryHours(step) => {
                let day_start = ts - ts.rem_euclid(SECONDS_PER_DAY);
                let current = i64::from(after.hour());
                let candidate = (current / i64::from(step) + 1) * i64::from(step);
                if candidate < 24 {
                    from_timestamp(day_start + candidate * SECONDS_PER_HOUR)
                } else {
                    from_timestamp(day_start + SECONDS_PER_DAY)
                }
            }
            RecurrenceSchedule::Daily { hour } => {
                let today = at_hour(after.date_naive(), hour)?;
                if today > after {
                    Some(today)
                } else {
                    at_hour(after.date_naive().succ_opt()?, hour)
                }
            }
            RecurrenceSchedule::Monthly { every, hour } => {
                let mut year = after.year();
                let mut month = after.month();
                // January always matches, so two years of candidates suffice.
                for _ in 0..25 {
                    if (month - 1) % every == 0 {
                        let candidate = at_hour(NaiveDate::from_ymd_opt(year, month, 1)?, hour)?;
                        if candidate > after {
                            return Some(candidate);
                        }
                    }
                    if month == 12 {
                        month = 1;
                        year += 1;
                    } else {
                        month += 1;
                    }
                }
                None
            }
        }
    }
}

impl fmt::Display for RecurrenceSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cron_expression())
    }
}

fn from_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

fn at_hour(date: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
    date.and_hms_opt(hour, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}
