//! When a job fires.
//!
//! Every trigger answers one question: given the last fire (or registration)
//! time, when is the next fire strictly after it? Clock times and weekdays are
//! evaluated in the configured local offset.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use cron::Schedule;

use crate::error::SchedulerError;

#[derive(Debug, Clone)]
pub enum Trigger {
    /// Once per local calendar day at `at`.
    Daily { at: NaiveTime },
    /// Every `every`, measured from the previous fire.
    Interval { every: Duration },
    /// Slots at `start + k * every` up to and including `end`, on the listed weekdays.
    Window {
        start: NaiveTime,
        end: NaiveTime,
        every: Duration,
        weekdays: Vec<Weekday>,
    },
    /// Cron expression, 5 or 6 fields.
    Cron { expression: String, schedule: Schedule },
}

impl Trigger {
    pub fn daily(at: NaiveTime) -> Self {
        Trigger::Daily { at }
    }

    pub fn interval(every: Duration) -> Result<Self, SchedulerError> {
        if every.is_zero() {
            return Err(SchedulerError::InvalidTrigger(
                "interval must be positive".to_string(),
            ));
        }
        Ok(Trigger::Interval { every })
    }

    pub fn window(
        start: NaiveTime,
        end: NaiveTime,
        every: Duration,
        weekdays: Vec<Weekday>,
    ) -> Result<Self, SchedulerError> {
        if every.is_zero() {
            return Err(SchedulerError::InvalidTrigger(
                "window interval must be positive".to_string(),
            ));
        }
        if start > end {
            return Err(SchedulerError::InvalidTrigger(format!(
                "window start {start} is after end {end}"
            )));
        }
        if weekdays.is_empty() {
            return Err(SchedulerError::InvalidTrigger(
                "window needs at least one weekday".to_string(),
            ));
        }
        Ok(Trigger::Window {
            start,
            end,
            every,
            weekdays,
        })
    }

    pub fn cron(expression: &str) -> Result<Self, SchedulerError> {
        let expression = normalize_cron(expression);
        let schedule = Schedule::from_str(&expression)
            .map_err(|e| SchedulerError::InvalidTrigger(format!("cron '{expression}': {e}")))?;
        Ok(Trigger::Cron {
            expression,
            schedule,
        })
    }

    /// First fire time strictly after `after`, or `None` if there is none.
    pub fn next_after(&self, after: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Daily { at } => {
                let local = after.with_timezone(&offset);
                let today = at_local(local.date_naive(), *at, offset)?;
                if today > after {
                    Some(today)
                } else {
                    at_local(local.date_naive().succ_opt()?, *at, offset)
                }
            }
            Trigger::Interval { every } => Some(after + chrono::Duration::from_std(*every).ok()?),
            Trigger::Window {
                start,
                end,
                every,
                weekdays,
            } => next_window_slot(after, offset, *start, *end, *every, weekdays),
            Trigger::Cron { schedule, .. } => schedule
                .after(&after.with_timezone(&offset))
                .next()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Short human-readable form for status output.
    pub fn describe(&self) -> String {
        match self {
            Trigger::Daily { at } => format!("daily at {}", at.format("%H:%M")),
            Trigger::Interval { every } => format!("every {}", format_duration(*every)),
            Trigger::Window {
                start,
                end,
                every,
                weekdays,
            } => {
                let days: Vec<String> = weekdays.iter().map(|d| d.to_string()).collect();
                format!(
                    "every {} {}-{} {}",
                    format_duration(*every),
                    start.format("%H:%M"),
                    end.format("%H:%M"),
                    days.join(",")
                )
            }
            Trigger::Cron { expression, .. } => format!("cron {expression}"),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn at_local(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn next_window_slot(
    after: DateTime<Utc>,
    offset: FixedOffset,
    start: NaiveTime,
    end: NaiveTime,
    every: Duration,
    weekdays: &[Weekday],
) -> Option<DateTime<Utc>> {
    let step = chrono::Duration::from_std(every).ok()?;
    let mut date = after.with_timezone(&offset).date_naive();

    // A full week covers every weekday once.
    for _ in 0..8 {
        if weekdays.contains(&date.weekday()) {
            let first = at_local(date, start, offset)?;
            let last = at_local(date, end, offset)?;
            let slot = if after < first {
                first
            } else {
                let elapsed = (after - first).num_milliseconds();
                let k = elapsed / step.num_milliseconds().max(1) + 1;
                first + step * k as i32
            };
            if slot <= last {
                return Some(slot);
            }
        }
        date = date.succ_opt()?;
    }
    None
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires `sec min hour day-of-month month day-of-week`.
fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        format!("{}ms", d.as_millis())
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
