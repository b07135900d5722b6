//! # Timer Schedule Parsing
//!
//! Parses the string forms accepted for a timer's due time, period and
//! time-to-live:
//!
//! - Go-style durations: `500ms`, `1h2m3.5s`, `0`
//! - ISO 8601 durations: `PT1S`, `P1DT2H`, `P2W`
//! - ISO 8601 repetitions (period only): `R5/PT1S`, `R/PT1S`
//! - RFC 3339 absolute times (due time and TTL only)
//!
//! Calendar units (years and months) are rejected because their length
//! depends on the start date.

use super::errors::{TimerError, TimerResult};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Recurrence of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub interval: Duration,
    /// Total number of ticks; `None` repeats until deleted or expired
    pub repetitions: Option<u32>,
}

impl Period {
    /// A zero interval has no repeats; it would otherwise re-fire at the
    /// same instant forever.
    fn repeating(interval: Duration, repetitions: Option<u32>) -> Option<Self> {
        (!interval.is_zero()).then_some(Self {
            interval,
            repetitions,
        })
    }
}

/// Parses a due time into the first tick instant. Empty means `now`.
pub fn parse_due_time(value: &str, now: DateTime<Utc>) -> TimerResult<DateTime<Utc>> {
    if value.is_empty() {
        return Ok(now);
    }
    if let Ok(duration) = parse_duration(value) {
        return add(now, duration, "due_time", value);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| TimerError::invalid_schedule("due_time", value, "expected a duration or RFC 3339 time"))
}

/// Parses a period. Empty or zero-length means the timer fires once.
pub fn parse_period(value: &str) -> TimerResult<Option<Period>> {
    if value.is_empty() {
        return Ok(None);
    }

    let Some(rest) = value.strip_prefix('R') else {
        let interval = parse_duration(value)
            .map_err(|reason| TimerError::invalid_schedule("period", value, reason))?;
        return Ok(Period::repeating(interval, None));
    };

    let (count, duration) = rest.split_once('/').ok_or_else(|| {
        TimerError::invalid_schedule("period", value, "repetition must be of the form R<n>/<duration>")
    })?;
    let repetitions = if count.is_empty() {
        None
    } else {
        match count.parse::<u32>() {
            Ok(0) => {
                return Err(TimerError::invalid_schedule("period", value, "repetition count must be positive"))
            }
            Ok(n) => Some(n),
            Err(_) => {
                return Err(TimerError::invalid_schedule("period", value, "invalid repetition count"))
            }
        }
    };
    let interval = parse_iso8601_duration(duration)
        .map_err(|reason| TimerError::invalid_schedule("period", value, reason))?;

    Ok(Period::repeating(interval, repetitions))
}

/// Parses a time-to-live into an absolute expiration. A relative TTL counts
/// from the first tick. Empty means no expiration.
pub fn parse_ttl(value: &str, first_tick: DateTime<Utc>) -> TimerResult<Option<DateTime<Utc>>> {
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(duration) = parse_duration(value) {
        return add(first_tick, duration, "ttl", value).map(Some);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|at| Some(at.with_timezone(&Utc)))
        .map_err(|_| TimerError::invalid_schedule("ttl", value, "expected a duration or RFC 3339 time"))
}

/// Parses either a Go-style or an ISO 8601 duration.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    if value.starts_with('P') {
        parse_iso8601_duration(value)
    } else {
        parse_go_duration(value)
    }
}

/// Parses `[-]<number><unit>...` with units ns, us, µs, ms, s, m, h.
/// Negative durations are rejected.
pub fn parse_go_duration(value: &str) -> Result<Duration, String> {
    if value == "0" {
        return Ok(Duration::ZERO);
    }
    if value.is_empty() {
        return Err("empty duration".to_string());
    }
    if value.starts_with('-') {
        return Err("negative durations are not allowed".to_string());
    }
    let mut rest = value.strip_prefix('+').unwrap_or(value);

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {value:?}"))?;
        if number_len == 0 {
            return Err(format!("expected number in duration {value:?}"));
        }
        let number: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration {value:?}"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            other => return Err(format!("unknown unit {other:?} in duration {value:?}")),
        };
        rest = &rest[unit_len..];
        total_nanos += number * nanos_per_unit;
    }

    nanos_to_duration(total_nanos, value)
}

/// Parses `P[nW][nD][T[nH][nM][n[.f]S]]`.
pub fn parse_iso8601_duration(value: &str) -> Result<Duration, String> {
    let body = value
        .strip_prefix('P')
        .ok_or_else(|| format!("ISO 8601 duration {value:?} must start with P"))?;
    if body.is_empty() || body == "T" {
        return Err(format!("empty ISO 8601 duration {value:?}"));
    }

    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return Err(format!("missing time components in {value:?}"));
            }
            (date, time)
        }
        None => (body, ""),
    };

    let mut total_secs = 0.0;
    for (amount, unit) in designators(date_part, value)? {
        total_secs += amount
            * match unit {
                'W' => 7.0 * 86_400.0,
                'D' => 86_400.0,
                'Y' | 'M' => return Err(format!("calendar unit {unit} is not supported in {value:?}")),
                other => return Err(format!("unknown date designator {other} in {value:?}")),
            };
    }
    for (amount, unit) in designators(time_part, value)? {
        total_secs += amount
            * match unit {
                'H' => 3600.0,
                'M' => 60.0,
                'S' => 1.0,
                other => return Err(format!("unknown time designator {other} in {value:?}")),
            };
    }

    nanos_to_duration(total_secs * 1e9, value)
}

fn designators(part: &str, value: &str) -> Result<Vec<(f64, char)>, String> {
    let mut parsed = Vec::new();
    let mut number = String::new();
    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let amount: f64 = number
            .parse()
            .map_err(|_| format!("invalid number before {c} in {value:?}"))?;
        parsed.push((amount, c));
        number.clear();
    }
    if !number.is_empty() {
        return Err(format!("trailing number without designator in {value:?}"));
    }
    Ok(parsed)
}

fn nanos_to_duration(nanos: f64, value: &str) -> Result<Duration, String> {
    if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
        return Err(format!("duration {value:?} is out of range"));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

fn add(base: DateTime<Utc>, duration: Duration, field: &str, value: &str) -> TimerResult<DateTime<Utc>> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| base.checked_add_signed(delta))
        .ok_or_else(|| TimerError::invalid_schedule(field, value, "duration is out of range"))
}
