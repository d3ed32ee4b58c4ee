// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared date/time helpers.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Calendar dates of a trailing window ending at `end` (inclusive), oldest first.
pub fn trailing_window(end: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..i64::from(days))
        .rev()
        .map(|offset| end - Duration::days(offset))
        .collect()
}

/// Parse a provider timestamp.
///
/// Fitbit reports device sync times as local datetimes without an offset
/// (`2024-01-15T10:30:00.000`); those are taken as UTC. Full RFC3339 is
/// accepted as well.
pub fn parse_provider_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
