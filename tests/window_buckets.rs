// tests/window_buckets.rs
use chrono::NaiveDate;
use news_digest::window::{
    default_month_reference, default_week_reference, month_bucket, week_bucket, Bucket,
};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn week_of_thursday_runs_monday_to_sunday() {
    let w = week_bucket(d("2024-03-14"));
    assert_eq!((w.first_day(), w.last_day()), (d("2024-03-11"), d("2024-03-17")));
}

#[test]
fn leap_february() {
    let m = month_bucket(d("2024-02-15"));
    assert_eq!((m.first_day(), m.last_day()), (d("2024-02-01"), d("2024-02-29")));
    assert_eq!(m.key(), "2024-02");
}

#[test]
fn default_month_in_january_is_previous_december() {
    let m = month_bucket(default_month_reference(d("2024-01-05")));
    assert_eq!((m.first_day(), m.last_day()), (d("2023-12-01"), d("2023-12-31")));
}

#[test]
fn default_week_is_last_completed_week() {
    // Running on a Monday still targets the week that just ended.
    let w = week_bucket(default_week_reference(d("2024-03-18")));
    assert_eq!(w.key(), "2024-03-11/2024-03-17");
    let w = week_bucket(default_week_reference(d("2024-03-24")));
    assert_eq!(w.key(), "2024-03-11/2024-03-17");
}
