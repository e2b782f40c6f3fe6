// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service-hour rounding.

use crate::models::{HoursRules, RoundingMode};
use crate::time_utils::{round_down, round_nearest, round_timestamp, round_up};
use chrono::{DateTime, Duration, Utc};

/// Round a clocked window by a location's rules.
///
/// The clock-in is moved to the nearest `time_threshold`, the elapsed time
/// is rounded to a multiple of `threshold` in the configured direction, and
/// the clock-out is placed that far after the rounded clock-in.
pub fn round_service_window(
    rules: &HoursRules,
    clock_in: DateTime<Utc>,
    clock_out: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = round_timestamp(clock_in, rules.time_threshold.seconds());
    let elapsed = (clock_out - clock_in).num_seconds().max(0);
    let step = rules.threshold.seconds();

    let rounded = match rules.rounding {
        RoundingMode::Up => round_up(elapsed, step),
        RoundingMode::Down => round_down(elapsed, step),
        RoundingMode::Normally => round_nearest(elapsed, step),
    };

    (start, start + Duration::seconds(rounded))
}
