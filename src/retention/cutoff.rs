//! Retention cutoff calculation.
//!
//! The cutoff is always midnight UTC on the first of a month, so a record
//! either survives a whole calendar month or is purged with the rest of it.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Calendar months kept when no retention period is configured.
pub const DEFAULT_RETAIN_MONTHS: u32 = 6;

/// Cutoff for the default six-month retention window.
///
/// `2024-03-15T10:00Z` gives `2023-09-01T00:00Z`.
pub fn compute_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    compute_cutoff_with_months(now, DEFAULT_RETAIN_MONTHS)
}

/// First day of the month `months` calendar months before `now`, at
/// 00:00:00 UTC.
///
/// Uses month arithmetic on the (year, month) pair only, so the day of
/// month in `now` never affects the result.
pub fn compute_cutoff_with_months(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let months_since_epoch = now.year() * 12 + now.month0() as i32 - months as i32;
    let year = months_since_epoch.div_euclid(12);
    let month0 = months_since_epoch.rem_euclid(12) as u32;

    // Only out of range for absurd month counts
    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
