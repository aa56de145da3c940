use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Epoch values above this are milliseconds, at or below it seconds.
pub const EPOCH_MS_THRESHOLD: f64 = 1e12;

static EPOCH_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{10,13}$").expect("valid epoch digits regex"));

static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2})[/\-](\d{2})[/\-](\d{4})(?:\s+(\d{2}):(\d{2})(?::(\d{2}))?)?$")
        .expect("valid dd/mm/yyyy regex")
});

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub fn days_to_ms(days: u32) -> i64 {
    days as i64 * DAY_MS
}

/// Midnight of `date` in `offset`, as a UTC instant.
pub fn midnight_in(date: NaiveDate, offset: &FixedOffset) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    local_to_utc(naive, offset).unwrap_or_else(|| naive.and_utc())
}

/// Midnight of the calendar day `now` falls on, in `now`'s own offset.
pub fn local_midnight(now: DateTime<FixedOffset>) -> DateTime<Utc> {
    midnight_in(now.date_naive(), now.offset())
}

/// The instant a local time in `offset` stands for, `None` past chrono's range.
pub fn local_to_utc(naive: NaiveDateTime, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    naive
        .checked_sub_signed(TimeDelta::seconds(offset.local_minus_utc() as i64))
        .map(|utc| utc.and_utc())
}

/// Interprets an epoch number as seconds or milliseconds.
pub fn epoch_to_datetime(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let ms = if value > EPOCH_MS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };
    DateTime::from_timestamp_millis(ms.trunc() as i64)
}

/// Parses a date from any row value.
///
/// Accepted, in order: ISO 8601 / RFC 3339 / RFC 2822 strings, numeric epochs,
/// 10 to 13 digit epoch strings and `dd/mm/yyyy[ HH:MM[:SS]]`. Strings without
/// an explicit offset are read in `offset`, except bare `yyyy-mm-dd` which is
/// UTC midnight. Empty, zero, boolean and null values never yield a date.
pub fn parse_flexible_date(value: &Value, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let n = n.as_f64()?;
            if n == 0.0 {
                return None;
            }
            epoch_to_datetime(n)
        }
        Value::String(s) => parse_date_str(s, offset),
        _ => None,
    }
}

pub fn parse_date_str(input: &str, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    parse_native(s, offset)
        .or_else(|| parse_epoch_digits(s))
        .or_else(|| parse_day_month_year(s, offset))
}

fn parse_native(s: &str, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return local_to_utc(naive, offset);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_epoch_digits(s: &str) -> Option<DateTime<Utc>> {
    if !EPOCH_DIGITS.is_match(s) {
        return None;
    }
    let num: i64 = s.parse().ok()?;
    if s.len() >= 13 {
        DateTime::from_timestamp_millis(num)
    } else {
        DateTime::from_timestamp(num, 0)
    }
}

fn parse_day_month_year(s: &str, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    let caps = DAY_MONTH_YEAR.captures(s)?;
    let field = |idx: usize| -> u32 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(2), field(1))?;
    let time = NaiveTime::from_hms_opt(field(4), field(5), field(6))?;
    local_to_utc(date.and_time(time), offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_days_to_ms() {
        assert_eq!(days_to_ms(1), 86_400_000);
        assert_eq!(days_to_ms(30), 2_592_000_000);
    }

    #[test]
    fn test_local_midnight() {
        let now = brt().with_ymd_and_hms(2025, 10, 20, 22, 15, 0).unwrap();
        assert_eq!(local_midnight(now), ymd_hms(2025, 10, 20, 3, 0, 0));

        let now = utc().with_ymd_and_hms(2025, 10, 20, 0, 0, 1).unwrap();
        assert_eq!(local_midnight(now), ymd_hms(2025, 10, 20, 0, 0, 0));
    }

    #[test]
    fn test_parse_rfc3339_and_postgres_timestamps() {
        assert_eq!(
            parse_flexible_date(&json!("2025-10-05T12:30:00Z"), &brt()),
            Some(ymd_hms(2025, 10, 5, 12, 30, 0))
        );
        assert_eq!(
            parse_flexible_date(&json!("2025-10-05 12:30:00.123456+00"), &brt()),
            Some(ymd_hms(2025, 10, 5, 12, 30, 0) + TimeDelta::microseconds(123_456))
        );
        assert_eq!(
            parse_flexible_date(&json!("2025-10-05T12:30:00-03:00"), &utc()),
            Some(ymd_hms(2025, 10, 5, 15, 30, 0))
        );
    }

    #[test]
    fn test_naive_strings_use_local_offset() {
        assert_eq!(
            parse_flexible_date(&json!("2025-10-05T12:30:00"), &brt()),
            Some(ymd_hms(2025, 10, 5, 15, 30, 0))
        );
        // Date-only ISO strings are UTC midnight regardless of offset.
        assert_eq!(
            parse_flexible_date(&json!("2025-10-05"), &brt()),
            Some(ymd_hms(2025, 10, 5, 0, 0, 0))
        );
    }

    #[test]
    fn test_numeric_epochs() {
        assert_eq!(
            parse_flexible_date(&json!(1_760_000_000), &utc()),
            Some(DateTime::from_timestamp(1_760_000_000, 0).unwrap())
        );
        assert_eq!(
            parse_flexible_date(&json!(1_760_000_000_123_i64), &utc()),
            Some(DateTime::from_timestamp_millis(1_760_000_000_123).unwrap())
        );
        assert_eq!(parse_flexible_date(&json!(0), &utc()), None);
    }

    #[test]
    fn test_epoch_threshold_is_seconds() {
        assert_eq!(
            parse_flexible_date(&json!(1_000_000_000_000_i64), &utc()),
            DateTime::from_timestamp(1_000_000_000_000, 0)
        );
        assert_eq!(
            parse_flexible_date(&json!(1_000_000_000_001_i64), &utc()),
            DateTime::from_timestamp_millis(1_000_000_000_001)
        );
    }

    #[test]
    fn test_out_of_range_local_times_yield_no_date() {
        assert_eq!(
            parse_flexible_date(&json!("+262142-12-31T23:00:00"), &brt()),
            None
        );
        assert_eq!(parse_flexible_date(&json!("+262142-12-31 23:30"), &brt()), None);
        assert_eq!(
            local_to_utc(NaiveDateTime::MAX, &brt()),
            None
        );
        assert!(local_to_utc(NaiveDateTime::MAX, &utc()).is_some());
    }

    #[test]
    fn test_epoch_digit_strings() {
        assert_eq!(
            parse_flexible_date(&json!("1760000000"), &utc()),
            Some(DateTime::from_timestamp(1_760_000_000, 0).unwrap())
        );
        assert_eq!(
            parse_flexible_date(&json!("1760000000123"), &utc()),
            Some(DateTime::from_timestamp_millis(1_760_000_000_123).unwrap())
        );
        assert_eq!(parse_flexible_date(&json!("123456789"), &utc()), None);
    }

    #[test]
    fn test_day_month_year() {
        assert_eq!(
            parse_flexible_date(&json!("05/10/2025"), &brt()),
            Some(ymd_hms(2025, 10, 5, 3, 0, 0))
        );
        assert_eq!(
            parse_flexible_date(&json!("05-10-2025 14:20"), &utc()),
            Some(ymd_hms(2025, 10, 5, 14, 20, 0))
        );
        assert_eq!(
            parse_flexible_date(&json!("05/10/2025 14:20:09"), &utc()),
            Some(ymd_hms(2025, 10, 5, 14, 20, 9))
        );
        assert_eq!(parse_flexible_date(&json!("31/02/2025"), &utc()), None);
    }

    #[test]
    fn test_unparsable_values() {
        for value in [
            json!(null),
            json!(""),
            json!("   "),
            json!(true),
            json!(false),
            json!("ontem"),
            json!({"at": "2025-10-05"}),
        ] {
            assert_eq!(parse_flexible_date(&value, &utc()), None, "{value}");
        }
    }
}
