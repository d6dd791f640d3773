//! Calendar arithmetic for recurring reminders.

use chrono::{DateTime, Duration, FixedOffset, Months, Utc};

use crate::model::{Recurrence, Reminder};

impl Recurrence {
    /// Advance `at` by exactly one recurrence unit.
    ///
    /// Daily and weekly steps are fixed durations. Monthly steps move one
    /// calendar month in the local offset and clamp to the last day of a
    /// shorter month (Jan 31 -> Feb 28/29).
    pub fn advance(self, at: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
        match self {
            Recurrence::Daily => at + Duration::days(1),
            Recurrence::Weekly => at + Duration::weeks(1),
            Recurrence::Monthly => at
                .with_timezone(&offset)
                .checked_add_months(Months::new(1))
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(at + Duration::days(30)),
        }
    }

    /// First occurrence strictly after `now`, stepping from `at` in whole units.
    ///
    /// Always advances at least once, so a reminder that just fired never
    /// keeps its current trigger time.
    pub fn next_after(
        self,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> DateTime<Utc> {
        let step = match self {
            Recurrence::Daily => Some(Duration::days(1)),
            Recurrence::Weekly => Some(Duration::weeks(1)),
            Recurrence::Monthly => None,
        };

        if let Some(step) = step {
            let next = at + step;
            if next > now {
                return next;
            }
            let behind = (now - next).num_seconds() / step.num_seconds() + 1;
            let candidate = next + step * behind as i32;
            return if candidate > now { candidate } else { candidate + step };
        }

        let mut next = self.advance(at, offset);
        while next <= now {
            next = self.advance(next, offset);
        }
        next
    }
}

impl Reminder {
    /// Trigger time after this reminder fires at `now`, or `None` if it is one-shot.
    pub fn next_trigger(&self, now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        self.recurrence
            .map(|rec| rec.next_after(self.trigger_at, now, offset))
    }
}
