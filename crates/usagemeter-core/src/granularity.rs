//! Calendar bucketing for time-series aggregation
//!
//! Events are bucketed by truncating `created_at` in UTC. Weeks start on
//! Monday.

use crate::error::MeterError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar-truncation unit for time buckets
///
/// # Examples
/// ```
/// use usagemeter_core::granularity::Granularity;
/// use chrono::{TimeZone, Utc};
///
/// let ts = Utc.with_ymd_and_hms(2024, 3, 14, 15, 9, 26).unwrap();
/// let bucket = "month".parse::<Granularity>().unwrap().truncate(ts);
/// assert_eq!(bucket, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    /// Start of the bucket containing `ts`
    pub fn truncate(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let start = match self {
            Self::Day => date,
            Self::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
            Self::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        };
        start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Label used when rendering a bucket start
    pub fn label(&self, bucket_start: DateTime<Utc>) -> String {
        match self {
            Self::Day | Self::Week => bucket_start.format("%Y-%m-%d").to_string(),
            Self::Month => bucket_start.format("%Y-%m").to_string(),
            Self::Year => bucket_start.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
        }
    }
}

impl FromStr for Granularity {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(MeterError::InvalidGranularity(s.to_string())),
        }
    }
}
