//! # Day intervals
//!
//! All temporal reasoning in the shadow log is a pure function of an
//! instant and a time resolution. A resolution `R` is a number of seconds
//! that divides a day evenly; it splits every UTC day into `86400 / R`
//! half-open, day-aligned intervals numbered from zero.
//!
//! These routines perform no validation: rejecting an inadmissible
//! resolution is the repository's job, never the bucketing's.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};

/// Number of seconds in a day. Admissible resolutions divide this evenly.
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Whether `time_res_s` is one of the 96 admissible resolutions
pub fn admissible(time_res_s: u32) -> bool {
    time_res_s > 0 && SECONDS_PER_DAY % time_res_s == 0
}

/// Number of the interval containing `dt` under resolution `time_res_s`.
/// Sub-second precision is ignored.
pub fn interval_number(dt: DateTime<Utc>, time_res_s: u32) -> u32 {
    dt.num_seconds_from_midnight() / time_res_s
}

/// Instant at which interval `n` of `date` starts
pub fn interval_start(date: NaiveDate, time_res_s: u32, n: u32) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap().and_utc();

    midnight + Duration::seconds(i64::from(time_res_s) * i64::from(n))
}

/// Last representable instant inside interval `n` of `date`: one
/// microsecond before the next interval starts
pub fn interval_end(date: NaiveDate, time_res_s: u32, n: u32) -> DateTime<Utc> {
    interval_start(date, time_res_s, n + 1) - Duration::microseconds(1)
}

/// Instant at the exact middle of interval `n` of `date`. Lands on a half
/// second for odd resolutions.
pub fn interval_mid(date: NaiveDate, time_res_s: u32, n: u32) -> DateTime<Utc> {
    interval_start(date, time_res_s, n) + Duration::microseconds(i64::from(time_res_s) * 500_000)
}

/// Start of the interval containing `dt`
pub fn interval_start_containing(dt: DateTime<Utc>, time_res_s: u32) -> DateTime<Utc> {
    interval_start(dt.date_naive(), time_res_s, interval_number(dt, time_res_s))
}

/// Time left from `dt` to the next interval boundary
pub fn seconds_left(dt: DateTime<Utc>, time_res_s: u32) -> Duration {
    interval_start(dt.date_naive(), time_res_s, interval_number(dt, time_res_s) + 1) - dt
}

/// The least instant strictly after `dt`, within the following 24 hours,
/// that is an interval boundary under both resolutions at once.
///
/// Boundaries of the coarser resolution are enumerated forward from `dt`
/// and checked for coincidence under the finer one. Midnight is a boundary
/// under every admissible resolution, so the search never has to look past
/// the end of the day.
pub fn next_common_start(
    dt: DateTime<Utc>,
    time_res_s_a: u32,
    time_res_s_b: u32,
) -> DateTime<Utc> {
    let coarse = time_res_s_a.max(time_res_s_b);
    let fine = time_res_s_a.min(time_res_s_b);
    let date = dt.date_naive();

    for n in (interval_number(dt, coarse) + 1)..=(SECONDS_PER_DAY / coarse) {
        let candidate = interval_start(date, coarse, n);
        if candidate == interval_start_containing(candidate, fine) {
            return candidate;
        }
    }

    interval_start(date, SECONDS_PER_DAY, 1)
}

/// Sleep through the remainder of the interval containing the present
/// instant, returning shortly after the next boundary.
///
/// Exists solely for test harnesses that need to force an interval change;
/// it is not part of the production contract.
pub fn sleep_until_interval_end(time_res_s: u32) {
    let wait = seconds_left(Utc::now(), time_res_s) + Duration::milliseconds(10);
    if let Ok(wait) = wait.to_std() {
        std::thread::sleep(wait);
    }
}
