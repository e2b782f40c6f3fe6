// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for lesson times and timestamp rounding.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};

/// Parse a wall-clock lesson time such as `3:00 PM`.
///
/// Period names ("A Period") and other free-form labels return `None`.
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%I:%M %p").ok()
}

/// Length in hours of a `from`..`to` lesson window, if both ends parse
/// and the window is non-empty.
pub fn window_hours(from: &str, to: &str) -> Option<f64> {
    let start = parse_clock_time(from)?;
    let end = parse_clock_time(to)?;
    let seconds = (end - start).num_seconds();
    (seconds > 0).then(|| seconds as f64 / 3600.0)
}

/// Integer division rounding toward negative infinity.
fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// Round `value` down to a multiple of `step`.
pub fn round_down(value: i64, step: i64) -> i64 {
    div_floor(value, step) * step
}

/// Round `value` up to a multiple of `step`.
pub fn round_up(value: i64, step: i64) -> i64 {
    -round_down(-value, step)
}

/// Round `value` to the nearest multiple of `step`, halves rounding up.
pub fn round_nearest(value: i64, step: i64) -> i64 {
    round_down(value + step / 2, step)
}

/// Round a timestamp to the nearest multiple of `step_secs` since the epoch.
pub fn round_timestamp(date: DateTime<Utc>, step_secs: i64) -> DateTime<Utc> {
    let millis = date.timestamp_millis();
    let rounded = round_nearest(millis, step_secs * 1000);
    Utc.timestamp_millis_opt(rounded).single().unwrap_or(date)
}
