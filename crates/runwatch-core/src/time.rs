//! Timestamp helpers. All stored timestamps are microseconds since the epoch.

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub fn to_utc(ts_us: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(ts_us).unwrap_or_default()
}

pub fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

/// Calendar date of `ts_us` in `tz`.
pub fn local_date(ts_us: i64, tz: Tz) -> NaiveDate {
    to_utc(ts_us).with_timezone(&tz).date_naive()
}

/// Midnight of `date` in `tz`, as microseconds since the epoch.
///
/// When midnight is skipped by a DST jump the first instant of the day is used.
pub fn day_start(date: NaiveDate, tz: Tz) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.timestamp_micros(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_micros(),
        LocalResult::None => {
            let shifted = midnight + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.timestamp_micros())
                .unwrap_or_else(|| tz.from_utc_datetime(&midnight).timestamp_micros())
        }
    }
}

/// Canonical day bucket of `ts_us`: midnight of its local date in `tz`.
pub fn canonical_day(ts_us: i64, tz: Tz) -> i64 {
    day_start(local_date(ts_us, tz), tz)
}

/// `date` moved back by `days`, saturating at the earliest representable date.
pub fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days))
        .unwrap_or(NaiveDate::MIN)
}

/// Human-readable form used in notification bodies.
pub fn format_us(ts_us: i64, tz: Tz) -> String {
    to_utc(ts_us)
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LA: Tz = chrono_tz::America::Los_Angeles;

    #[test]
    fn canonical_day_truncates_in_zone() {
        // 2024-03-01T07:30:00Z is 2024-02-29 23:30 in Los Angeles.
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap().timestamp_micros();
        let day = canonical_day(ts, LA);
        let expected = Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap().timestamp_micros();
        assert_eq!(day, expected);
    }

    #[test]
    fn same_local_day_shares_bucket() {
        let morning = Utc.with_ymd_and_hms(2024, 6, 10, 15, 0, 0).unwrap().timestamp_micros();
        let evening = Utc.with_ymd_and_hms(2024, 6, 11, 6, 0, 0).unwrap().timestamp_micros();
        assert_eq!(canonical_day(morning, LA), canonical_day(evening, LA));
    }

    #[test]
    fn day_start_handles_dst_boundary_dates() {
        let spring = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let next = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        // The spring-forward day is 23 hours long.
        assert_eq!(
            day_start(next, LA) - day_start(spring, LA),
            23 * 3_600 * 1_000_000
        );
    }

    #[test]
    fn days_before_walks_calendar() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(days_before(d, 1), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(days_before(d, 7), NaiveDate::from_ymd_opt(2024, 2, 23).unwrap());
    }
}
