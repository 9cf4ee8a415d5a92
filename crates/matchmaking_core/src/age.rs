//! crates/matchmaking_core/src/age.rs
//!
//! Calendar arithmetic for ages and the birth-date windows used when browsing.

use chrono::{Datelike, Months, NaiveDate};

pub const MIN_AGE: i16 = 18;
pub const MAX_AGE: i16 = 120;

/// Whole years between `birth_date` and `today`.
///
/// Someone born on Feb 29 turns a year older on Mar 1 in non-leap years.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    years
}

/// The date exactly `years` calendar years before `today`.
///
/// Feb 29 clamps to Feb 28 when the target year is not a leap year.
pub fn years_before(today: NaiveDate, years: u32) -> Option<NaiveDate> {
    today.checked_sub_months(Months::new(years.checked_mul(12)?))
}

/// Birth-date window for candidates aged `age_min..=age_max` on `today`.
///
/// Returns `(born_on_or_before, born_after)`: the inclusive latest birth date
/// of someone at least `age_min`, and the exclusive earliest birth date of
/// someone at most `age_max`.
pub fn birth_date_bounds(
    age_min: i16,
    age_max: i16,
    today: NaiveDate,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let latest = u32::try_from(age_min)
        .ok()
        .and_then(|years| years_before(today, years));
    let earliest = u32::try_from(age_max)
        .ok()
        .and_then(|years| years.checked_add(1))
        .and_then(|years| years_before(today, years));
    (latest, earliest)
}
