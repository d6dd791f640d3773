//! Local clock helpers.
//!
//! Everything is stored in UTC; day boundaries and clock-time triggers are
//! evaluated in a fixed local UTC offset taken from settings.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc};

use crate::error::SettingsError;

/// Parse a `HH:MM` clock string.
pub fn parse_clock(key: &str, value: &str) -> Result<NaiveTime, SettingsError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| SettingsError::invalid(key, format!("'{value}' is not HH:MM ({e})")))
}

/// Parse a UTC offset such as `+05:30`, `-04:00`, `UTC` or `Z`.
pub fn parse_offset(key: &str, value: &str) -> Result<FixedOffset, SettingsError> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("utc") || v == "Z" {
        return Ok(Utc.fix());
    }

    let (sign, rest) = match v.as_bytes().first() {
        Some(b'+') => (1, &v[1..]),
        Some(b'-') => (-1, &v[1..]),
        _ => return Err(SettingsError::invalid(key, format!("'{value}' must start with + or -"))),
    };

    let (h, m) = rest
        .split_once(':')
        .ok_or_else(|| SettingsError::invalid(key, format!("'{value}' is not ±HH:MM")))?;
    let hours: i32 = h
        .parse()
        .map_err(|_| SettingsError::invalid(key, format!("bad hours in '{value}'")))?;
    let minutes: i32 = m
        .parse()
        .map_err(|_| SettingsError::invalid(key, format!("bad minutes in '{value}'")))?;
    if hours > 14 || minutes > 59 {
        return Err(SettingsError::invalid(key, format!("'{value}' is out of range")));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| SettingsError::invalid(key, format!("'{value}' is out of range")))
}

/// Current wall-clock time in the given offset.
pub fn now_in(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

/// UTC bounds `[start, end)` of the local calendar day containing `now`.
pub fn local_day_bounds(now: DateTime<FixedOffset>) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = *now.offset();
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    // Fixed offsets have no gaps, so the local midnight always exists.
    let start = offset
        .from_local_datetime(&midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc));
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_and_negative_offsets() {
        assert_eq!(
            parse_offset("tz", "+05:30").unwrap().local_minus_utc(),
            5 * 3600 + 30 * 60
        );
        assert_eq!(parse_offset("tz", "-04:00").unwrap().local_minus_utc(), -4 * 3600);
        assert_eq!(parse_offset("tz", "UTC").unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn rejects_malformed_offsets() {
        assert!(parse_offset("tz", "05:30").is_err());
        assert!(parse_offset("tz", "+5").is_err());
        assert!(parse_offset("tz", "+25:00").is_err());
    }

    #[test]
    fn parses_clock_strings() {
        assert_eq!(
            parse_clock("t", "07:00").unwrap(),
            NaiveTime::from_hms_opt(7, 0, 0).unwrap()
        );
        assert!(parse_clock("t", "7am").is_err());
        assert!(parse_clock("t", "24:10").is_err());
    }

    #[test]
    fn day_bounds_follow_local_midnight() {
        let ist = parse_offset("tz", "+05:30").unwrap();
        // 2026-01-10 01:00 IST == 2026-01-09 19:30 UTC
        let now = ist.with_ymd_and_hms(2026, 1, 10, 1, 0, 0).unwrap();
        let (start, end) = local_day_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 9, 18, 30, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 10, 18, 30, 0).unwrap());
    }
}
