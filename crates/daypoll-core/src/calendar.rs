//! The calendar that partitions polls by day.
//!
//! Every day-scoped key embeds the date returned by [`Calendar::today`].
//! Production uses [`UtcCalendar`], so a day runs from 00:00 to 24:00 UTC
//! regardless of the server's local zone. Tests use [`FixedCalendar`] to pin
//! or advance the day without waiting for midnight.

use std::sync::atomic::{AtomicI32, Ordering};

use chrono::{Datelike, NaiveDate, Utc};

/// Source of the current partition day.
pub trait Calendar: Send + Sync {
    /// The current calendar day.
    fn today(&self) -> NaiveDate;
}

/// The current UTC date.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcCalendar;

impl Calendar for UtcCalendar {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A calendar pinned to a given day that only moves when told to.
#[derive(Debug)]
pub struct FixedCalendar {
    days_from_ce: AtomicI32,
}

impl FixedCalendar {
    /// Pin the calendar to `day`.
    pub fn new(day: NaiveDate) -> Self {
        Self {
            days_from_ce: AtomicI32::new(day.num_days_from_ce()),
        }
    }

    /// Move the calendar by `days` (negative moves backwards).
    ///
    /// Returns `false` and leaves the day unchanged if the result would fall
    /// outside the representable date range.
    pub fn advance_days(&self, days: i32) -> bool {
        self.days_from_ce
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current
                    .checked_add(days)
                    .filter(|next| NaiveDate::from_num_days_from_ce_opt(*next).is_some())
            })
            .is_ok()
    }

    /// Re-pin the calendar to `day`.
    pub fn set(&self, day: NaiveDate) {
        self.days_from_ce
            .store(day.num_days_from_ce(), Ordering::SeqCst);
    }
}

impl Calendar for FixedCalendar {
    fn today(&self) -> NaiveDate {
        NaiveDate::from_num_days_from_ce_opt(self.days_from_ce.load(Ordering::SeqCst))
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fixed_calendar_advances() {
        let start = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        let calendar = FixedCalendar::new(start);
        assert_eq!(calendar.today(), start);

        assert!(calendar.advance_days(1));
        assert_eq!(calendar.today(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

        assert!(calendar.advance_days(-1));
        assert_eq!(calendar.today(), start);
    }

    #[test]
    fn fixed_calendar_refuses_out_of_range() {
        let calendar = FixedCalendar::new(NaiveDate::MAX);
        assert!(!calendar.advance_days(1));
        assert_eq!(calendar.today(), NaiveDate::MAX);
    }

    #[test]
    fn utc_calendar_matches_chrono() {
        let before = Utc::now().date_naive();
        let today = UtcCalendar.today();
        let after = Utc::now().date_naive();
        assert!(today == before || today == after);
    }
}
