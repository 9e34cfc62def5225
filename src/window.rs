//! # Window Calculator
//! Pure bucket arithmetic for the three digest tiers. No I/O, no state:
//! every function maps one reference date to the same bucket on every call.
//!
//! * day  : half-open `[date 00:00 UTC, date+1 00:00 UTC)`
//! * week : ISO week, Monday..=Sunday
//! * month: calendar month, first..=last day

use std::fmt;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};

/// Shared view of a bucket as seen by the store: a key and an inclusive day span.
pub trait Bucket: fmt::Display + Send + Sync {
    /// Application-level identity of the bucket (`2024-03-14`, `2024-03`, ...).
    fn key(&self) -> String {
        self.to_string()
    }
    fn first_day(&self) -> NaiveDate;
    fn last_day(&self) -> NaiveDate;
}

/// One UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBucket {
    pub date: NaiveDate,
}

impl DayBucket {
    /// Inclusive lower bound (midnight UTC).
    pub fn start(&self) -> DateTime<Utc> {
        self.date.and_time(NaiveTime::MIN).and_utc()
    }

    /// Exclusive upper bound (next midnight UTC).
    pub fn end(&self) -> DateTime<Utc> {
        self.start() + Duration::days(1)
    }
}

impl Bucket for DayBucket {
    fn first_day(&self) -> NaiveDate {
        self.date
    }
    fn last_day(&self) -> NaiveDate {
        self.date
    }
}

impl fmt::Display for DayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))
    }
}

/// ISO week, Monday through Sunday (both inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekBucket {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Bucket for WeekBucket {
    fn first_day(&self) -> NaiveDate {
        self.start
    }
    fn last_day(&self) -> NaiveDate {
        self.end
    }
}

impl fmt::Display for WeekBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Calendar month. Only built through [`month_bucket`], so the day span is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthBucket {
    pub year: i32,
    pub month: u32,
    first: NaiveDate,
    last: NaiveDate,
}

impl Bucket for MonthBucket {
    fn first_day(&self) -> NaiveDate {
        self.first
    }
    fn last_day(&self) -> NaiveDate {
        self.last
    }
}

impl fmt::Display for MonthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

pub fn day_bucket(date: NaiveDate) -> DayBucket {
    DayBucket { date }
}

/// Week containing `date`: `monday = date - weekday`, `sunday = monday + 6`.
pub fn week_bucket(date: NaiveDate) -> WeekBucket {
    let offset = i64::from(date.weekday().num_days_from_monday());
    let start = date - Duration::days(offset);
    WeekBucket {
        start,
        end: start + Duration::days(6),
    }
}

/// Calendar month containing `date`.
pub fn month_bucket(date: NaiveDate) -> MonthBucket {
    let first = date - Duration::days(i64::from(date.day0()));
    MonthBucket {
        year: date.year(),
        month: date.month(),
        first,
        last: first + Months::new(1) - Duration::days(1),
    }
}

/// Default daily reference: yesterday.
pub fn default_day_reference(today: NaiveDate) -> NaiveDate {
    today - Duration::days(1)
}

/// Default weekly reference: Monday of the current week minus 7 days,
/// i.e. the most recently completed week, never the one in progress.
pub fn default_week_reference(today: NaiveDate) -> NaiveDate {
    week_bucket(today).start - Duration::days(7)
}

/// Default monthly reference: a day inside the month preceding `today`'s month.
pub fn default_month_reference(today: NaiveDate) -> NaiveDate {
    // Day before the 1st is always in the previous month (Jan -> previous Dec).
    month_bucket(today).first - Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_bucket_is_half_open_midnight_to_midnight() {
        let b = day_bucket(d(2024, 3, 14));
        assert_eq!(b.start().to_rfc3339(), "2024-03-14T00:00:00+00:00");
        assert_eq!(b.end().to_rfc3339(), "2024-03-15T00:00:00+00:00");
        assert_eq!(b.key(), "2024-03-14");
    }

    #[test]
    fn week_bucket_on_monday_and_sunday() {
        assert_eq!(week_bucket(d(2024, 3, 11)).start, d(2024, 3, 11));
        let sunday = week_bucket(d(2024, 3, 17));
        assert_eq!(sunday.start, d(2024, 3, 11));
        assert_eq!(sunday.end, d(2024, 3, 17));
    }

    #[test]
    fn week_crossing_year_boundary() {
        let w = week_bucket(d(2025, 1, 1));
        assert_eq!(w.start, d(2024, 12, 30));
        assert_eq!(w.end, d(2025, 1, 5));
        assert_eq!(w.key(), "2024-12-30/2025-01-05");
    }

    #[test]
    fn month_lengths() {
        assert_eq!(month_bucket(d(2023, 2, 10)).last_day(), d(2023, 2, 28));
        assert_eq!(month_bucket(d(2000, 2, 10)).last_day(), d(2000, 2, 29));
        assert_eq!(month_bucket(d(1900, 2, 10)).last_day(), d(1900, 2, 28));
        assert_eq!(month_bucket(d(2024, 4, 30)).last_day(), d(2024, 4, 30));
        assert_eq!(month_bucket(d(2024, 12, 31)).first_day(), d(2024, 12, 1));
        assert_eq!(month_bucket(d(2024, 12, 1)).last_day(), d(2024, 12, 31));
        assert_eq!(month_bucket(d(2024, 1, 31)).last_day(), d(2024, 1, 31));
    }

    #[test]
    fn defaults_never_pick_the_current_period() {
        let today = d(2024, 3, 14);
        assert_eq!(default_day_reference(today), d(2024, 3, 13));
        assert_eq!(week_bucket(default_week_reference(today)).start, d(2024, 3, 4));
        assert_eq!(month_bucket(default_month_reference(today)).key(), "2024-02");
        // Monday itself still points at the previous week.
        assert_eq!(
            week_bucket(default_week_reference(d(2024, 3, 11))).start,
            d(2024, 3, 4)
        );
    }
}
