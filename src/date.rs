//! Date Kernel (C1): calendar arithmetic used by every other component.
//!
//! `Date` wraps a real calendar triple. Construction validates the triple
//! (Feb 29 is accepted only in leap years) so every other component can
//! treat a `Date` as always representing a real day.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Datelike, NaiveDate};

use crate::error::DateError;

/// A validated calendar date (year-month-day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(NaiveDate);

impl Date {
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date)
            .ok_or(DateError::InvalidDate { year, month, day })
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Days since the proleptic Gregorian epoch. Used only for comparisons
    /// and arithmetic; never exposed as a meaningful absolute value.
    fn ordinal_days(&self) -> i64 {
        self.0.num_days_from_ce() as i64
    }

    pub fn add_days(&self, days: i64) -> Date {
        Date(self.0 + chrono::Duration::days(days))
    }

    pub fn sub_days(&self, days: i64) -> Date {
        self.add_days(-days)
    }

    /// `self - other`, in days. Positive when `self` is later.
    pub fn diff_days(&self, other: &Date) -> i64 {
        self.ordinal_days() - other.ordinal_days()
    }

    pub fn compare(&self, other: &Date) -> std::cmp::Ordering {
        self.cmp(other)
    }

    pub fn is_leap_year(year: i32) -> bool {
        (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
    }

    pub fn days_in_month(year: i32, month: u32) -> u32 {
        match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 => {
                if Self::is_leap_year(year) {
                    29
                } else {
                    28
                }
            }
            _ => 0,
        }
    }

    /// The first day of this date's month.
    pub fn month_start(&self) -> Date {
        Date::new(self.year(), self.month(), 1).expect("month_start always valid")
    }

    pub fn format_iso(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    pub fn parse_iso(s: &str) -> Result<Self, DateError> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Date)
            .map_err(|_| DateError::ParseError(s.to_string()))
    }

    /// Today's date according to the active clock (§4.1: deterministic
    /// test-clock override).
    pub fn today() -> Date {
        Clock::today()
    }

    /// The anniversary of `event` that falls in `[today, today + 366]`
    /// (spec §4.1 rule, invariant 3 in §8).
    ///
    /// - If `event`'s (month, day) has not yet occurred this year, the
    ///   anniversary is this year.
    /// - Otherwise it is next year.
    /// - Feb 29 collapses to Feb 28 in a non-leap target year.
    /// - `next_anniversary(today, today) == today`.
    pub fn next_anniversary(today: Date, event: Date) -> Date {
        let candidate_year = today.year();
        let this_year = Self::anniversary_in_year(event, candidate_year);
        if this_year.compare(&today) != std::cmp::Ordering::Less {
            this_year
        } else {
            Self::anniversary_in_year(event, candidate_year + 1)
        }
    }

    fn anniversary_in_year(event: Date, year: i32) -> Date {
        let (month, day) = (event.month(), event.day());
        if month == 2 && day == 29 && !Self::is_leap_year(year) {
            Date::new(year, 2, 28).expect("Feb 28 always valid")
        } else {
            Date::new(year, month, day).expect("anniversary month/day reused from a valid date")
        }
    }

    /// Whole months elapsed from `event` to `today`, floor-rounded (never
    /// negative). Used by §4.3's effective-date minimum-elapsed-months
    /// suppression.
    pub fn months_since(event: Date, today: Date) -> i64 {
        if today.compare(&event) == std::cmp::Ordering::Less {
            return 0;
        }
        let mut months = (today.year() as i64 - event.year() as i64) * 12
            + (today.month() as i64 - event.month() as i64);
        if today.day() < event.day() {
            months -= 1;
        }
        months.max(0)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_iso())
    }
}

/// Deterministic clock override (§4.1). Production code calls
/// `Date::today()`; tests call `Clock::set_today_for_test` so every
/// downstream computation is reproducible.
struct Clock;

/// Days-from-CE sentinel meaning "no override installed"; `i64::MIN` can
/// never collide with a real `num_days_from_ce()` value.
static OVERRIDE_DAYS: AtomicI64 = AtomicI64::new(i64::MIN);

impl Clock {
    fn today() -> Date {
        let stored = OVERRIDE_DAYS.load(Ordering::SeqCst);
        if stored != i64::MIN {
            return Date(NaiveDate::from_num_days_from_ce_opt(stored as i32).expect("override always valid"));
        }
        Date(chrono::Utc::now().date_naive())
    }
}

/// Install a fixed "today" for the remainder of the process (tests only).
/// Not thread-safe across concurrent tests that set different clocks —
/// tests relying on this should not run the suite with a shared clock in
/// parallel on the same process; `cargo test` gives each test thread a
/// shared address space but distinct logical scenarios in this suite
/// always set the clock immediately before use within the same thread.
pub fn set_today_for_test(date: Date) {
    OVERRIDE_DAYS.store(date.0.num_days_from_ce() as i64, Ordering::SeqCst);
}

pub fn clear_test_clock() {
    OVERRIDE_DAYS.store(i64::MIN, Ordering::SeqCst);
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_date() -> impl Strategy<Value = Date> {
        (1900i32..=2100, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| Date::new(y, m, d).unwrap())
    }

    proptest! {
        /// §8 "Round-trip": parse(format(date)) = date for all valid dates, 1900-2100.
        #[test]
        fn round_trip_iso(d in any_date()) {
            prop_assert_eq!(Date::parse_iso(&d.format_iso()).unwrap(), d);
        }

        /// §8 invariant 3: next_anniversary lands in [today, today+366] and
        /// reuses event's (month, day) unless it's a Feb-29/non-leap
        /// collision, in which case it collapses to Feb 28.
        #[test]
        fn next_anniversary_invariant(today in any_date(), event in any_date()) {
            let anniv = Date::next_anniversary(today, event);
            prop_assert!(anniv.diff_days(&today) >= 0);
            prop_assert!(anniv.diff_days(&today) <= 366);
            if !(event.month() == 2 && event.day() == 29) {
                prop_assert_eq!((anniv.month(), anniv.day()), (event.month(), event.day()));
            }
        }
    }
}
