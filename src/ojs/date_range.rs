//! Date range utilities for statistics queries
//!
//! OJS expects dates as "YYYY-MM-DD" and rejects an end date of today,
//! since its statistics are compiled with a one-day lag.

use chrono::{Days, NaiveDate, Utc};

/// Inclusive date window sent as `dateStart` / `dateEnd`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Window covering the last `days` days, ending yesterday.
    pub fn lookback(today: NaiveDate, days: u32) -> Self {
        let end = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        let start = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    /// Same as [`DateRange::lookback`] relative to the current UTC date.
    pub fn last_days(days: u32) -> Self {
        Self::lookback(Utc::now().date_naive(), days)
    }

    pub fn params(&self) -> [(&'static str, String); 2] {
        [
            ("dateStart", day_bucket(self.start)),
            ("dateEnd", day_bucket(self.end)),
        ]
    }
}

/// Format a date as "YYYY-MM-DD".
fn day_bucket(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
