//! Parsing of the `--due` / `--at` arguments.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Resolve a user-supplied time in the local offset of `now`.
///
/// Accepted forms: `YYYY-MM-DD HH:MM` (or with a `T`), `YYYY-MM-DD` (which
/// takes `default_time`), `HH:MM` (today) and relative `+N[m|h|d]`.
pub fn parse_when(
    input: &str,
    now: DateTime<FixedOffset>,
    default_time: NaiveTime,
) -> Result<DateTime<Utc>> {
    let s = input.trim();
    if let Some(rel) = s.strip_prefix('+') {
        return now
            .with_timezone(&Utc)
            .checked_add_signed(parse_relative(rel)?)
            .ok_or_else(|| anyhow!("'{input}' is too far in the future"));
    }

    let local = if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        dt
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
        dt
    } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        date.and_time(default_time)
    } else if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
        now.date_naive().and_time(time)
    } else {
        bail!("could not understand time '{input}' (try \"2026-03-10 14:00\", \"14:00\" or \"+2h\")");
    };

    now.offset()
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("'{input}' does not exist in the local offset"))
}

fn parse_relative(rel: &str) -> Result<Duration> {
    let Some(unit) = rel.chars().last() else {
        bail!("relative time needs a number and a unit, e.g. +30m");
    };
    let n: i64 = rel[..rel.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| anyhow!("bad relative time '+{rel}'"))?;
    let duration = match unit {
        'm' => Duration::try_minutes(n),
        'h' => Duration::try_hours(n),
        'd' => Duration::try_days(n),
        _ => bail!("relative time '+{rel}' must end in m, h or d"),
    };
    duration.ok_or_else(|| anyhow!("relative time '+{rel}' is out of range"))
}
