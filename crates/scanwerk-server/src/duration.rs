// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compact duration text for the X-Generation-Time header: `350ms`, `1.5s`,
// `2m3.25s`, `1h0m0s`.

use std::fmt::Write;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Format `d` with the largest unit that keeps the integer part non-zero.
///
/// Below one second a single unit is used (`ns`, `µs`, `ms`); from one
/// second up, hours and minutes are spelled out once they are reached and
/// seconds keep their fraction. Trailing zeros of a fraction are dropped.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".into();
    }
    if nanos < NANOS_PER_SEC {
        let (scale, unit) = match nanos {
            0..1_000 => (1, "ns"),
            1_000..1_000_000 => (1_000, "µs"),
            _ => (1_000_000, "ms"),
        };
        return format!("{}{unit}", decimal(nanos, scale));
    }

    let secs = d.as_secs();
    let (hours, minutes) = (secs / 3600, (secs / 60) % 60);
    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let rem = u128::from(secs % 60) * NANOS_PER_SEC + u128::from(d.subsec_nanos());
    let _ = write!(out, "{}s", decimal(rem, NANOS_PER_SEC));
    out
}

/// `value / scale` as a decimal, without trailing zeros.
fn decimal(value: u128, scale: u128) -> String {
    let (whole, frac) = (value / scale, value % scale);
    if frac == 0 {
        return whole.to_string();
    }
    let width = scale.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
