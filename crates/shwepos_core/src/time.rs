//! Clock and calendar helpers shared by services and reports.
//!
//! Stored timestamps are UTC epoch milliseconds; calendar questions ("today",
//! "this week") are answered in the store's fixed UTC offset.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};

/// Current wall clock as epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Builds the store offset, falling back to UTC for out-of-range input.
pub fn store_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// Current time in the store offset.
pub fn store_now(utc_offset_minutes: i32) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&store_offset(utc_offset_minutes))
}

pub fn local_datetime(epoch_ms: i64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    offset.timestamp_millis_opt(epoch_ms).single()
}

pub fn local_date(epoch_ms: i64, offset: FixedOffset) -> Option<NaiveDate> {
    local_datetime(epoch_ms, offset).map(|value| value.date_naive())
}

/// Sunday that starts the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

pub fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}
