//! Working-day calendar arithmetic.
//!
//! The scheduler and codecs treat the calendar as a collaborator behind the
//! [`WorkCalendar`] trait: durations advance through work days only, while
//! predecessor lag is plain calendar-day arithmetic and never skips. The
//! provided [`WeekdayCalendar`] skips Saturday and Sunday.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Date arithmetic over a working-day calendar.
pub trait WorkCalendar {
    /// Whether the given date is a work day.
    fn is_work_day(&self, date: NaiveDate) -> bool;

    /// Advance `date` by `days` work days.
    ///
    /// Walks forward one calendar day at a time, counting only work days,
    /// so the result never lands on a non-work day. Zero days returns the
    /// input unchanged even when it falls on a non-work day.
    fn add_work_days(&self, date: NaiveDate, days: i64) -> NaiveDate {
        let mut current = date;
        let mut remaining = days;
        while remaining > 0 {
            current += Duration::days(1);
            if self.is_work_day(current) {
                remaining -= 1;
            }
        }
        current
    }

    /// Count work days in the half-open interval `(from, to]`.
    fn work_days_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        let mut count = 0;
        let mut current = from;
        while current < to {
            current += Duration::days(1);
            if self.is_work_day(current) {
                count += 1;
            }
        }
        count
    }
}

/// The standard five-day workweek: every day except Saturday and Sunday.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekdayCalendar;

impl WorkCalendar for WeekdayCalendar {
    fn is_work_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
