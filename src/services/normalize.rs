// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conversion of raw Fitbit day payloads into [`DailyMetricRecord`] fields.
//!
//! All functions here are pure: they take the parsed JSON of one endpoint for
//! one day and return that modality's contribution, or `None` when the day
//! has nothing to store.
//!
//! [`DailyMetricRecord`]: crate::models::DailyMetricRecord

use crate::models::{HeartRate, HeartRateZone, Sleep, SleepLevel};
use serde::Deserialize;
use serde_json::Value;

// ─── Heart rate ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct HeartRatePayload {
    #[serde(rename = "activities-heart", default)]
    activities_heart: Vec<HeartRateDay>,
}

#[derive(Debug, Deserialize)]
struct HeartRateDay {
    value: Option<HeartRateValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartRateValue {
    #[serde(default)]
    heart_rate_zones: Vec<HeartRateZone>,
    resting_heart_rate: Option<i64>,
}

/// Normalize a `/activities/heart/date/{date}/1d.json` payload.
///
/// Returns `None` when the payload has no day entry or the entry has no
/// `value`. Zones and resting heart rate are passed through unchanged.
pub fn normalize_heart_rate(payload: &Value) -> Option<HeartRate> {
    let parsed: HeartRatePayload = match HeartRatePayload::deserialize(payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Unrecognized heart rate payload");
            return None;
        }
    };

    let value = parsed.activities_heart.into_iter().next()?.value?;

    Some(HeartRate {
        average: average_heart_rate(&value.heart_rate_zones),
        resting_heart_rate: value.resting_heart_rate,
        zones: value.heart_rate_zones,
    })
}

/// Minutes-weighted mean of zone midpoints, rounded to the nearest integer.
///
/// Zones missing a bound or a minute count are left out. `None` when no
/// remaining zone has any minutes.
pub fn average_heart_rate(zones: &[HeartRateZone]) -> Option<i64> {
    let (weighted_sum, total_minutes) = zones
        .iter()
        .filter_map(|zone| Some(((zone.min? + zone.max?) / 2.0, zone.minutes?)))
        .fold((0.0, 0.0), |(sum, total), (midpoint, minutes)| {
            (sum + minutes * midpoint, total + minutes)
        });

    if total_minutes > 0.0 {
        Some((weighted_sum / total_minutes).round() as i64)
    } else {
        None
    }
}

// ─── Sleep ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct SleepPayload {
    #[serde(default)]
    sleep: Vec<SleepSession>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SleepSession {
    #[serde(default)]
    is_main_sleep: bool,
    #[serde(default)]
    duration: u64,
    efficiency: Option<i64>,
    levels: Option<SleepLevels>,
}

#[derive(Debug, Deserialize)]
struct SleepLevels {
    #[serde(default)]
    summary: Value,
    #[serde(default)]
    data: Vec<SleepLevel>,
}

/// Normalize a `/1.2/user/-/sleep/date/{date}.json` payload.
///
/// Picks the session flagged `isMainSleep`, falling back to the first one.
/// Returns `None` when there are no sessions.
pub fn normalize_sleep(payload: &Value) -> Option<Sleep> {
    let parsed: SleepPayload = match SleepPayload::deserialize(payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Unrecognized sleep payload");
            return None;
        }
    };

    let mut sessions = parsed.sleep;
    let index = sessions.iter().position(|s| s.is_main_sleep).unwrap_or(0);
    if index >= sessions.len() {
        return None;
    }
    let main = sessions.swap_remove(index);

    let (stages, minute_data) = match main.levels {
        Some(levels) => (levels.summary, levels.data),
        None => (Value::Null, Vec::new()),
    };

    Some(Sleep {
        duration: main.duration,
        efficiency: main.efficiency,
        stages,
        minute_data,
    })
}

// ─── Summary modalities ──────────────────────────────────────────────────────

/// Modalities stored as an opaque summary value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Hrv,
    OxygenSaturation,
    RespiratoryRate,
    Temperature,
    Ecg,
}

impl Modality {
    /// Top-level key holding the day entries; `None` when the payload itself
    /// is the entry (SpO2 daily summary).
    fn payload_key(self) -> Option<&'static str> {
        match self {
            Modality::Hrv => Some("hrv"),
            Modality::OxygenSaturation => None,
            Modality::RespiratoryRate => Some("br"),
            Modality::Temperature => Some("tempCore"),
            Modality::Ecg => Some("ecgReadings"),
        }
    }
}

/// Extract the day's summary for a modality.
///
/// For list payloads the first entry's `value` sub-field is used (or the
/// entry itself when it has none). ECG keeps the full list of readings.
/// Empty, null, and missing payloads yield `None`.
pub fn normalize_summary(modality: Modality, payload: &Value) -> Option<Value> {
    let section = match modality.payload_key() {
        Some(key) => payload.get(key)?,
        None => payload,
    };

    let summary = match section {
        Value::Array(entries) if modality == Modality::Ecg => {
            if entries.is_empty() {
                return None;
            }
            section.clone()
        }
        Value::Array(entries) => entry_value(entries.first()?),
        Value::Object(_) => entry_value(section),
        _ => return None,
    };

    match summary {
        Value::Null => None,
        Value::Object(ref map) if map.is_empty() => None,
        other => Some(other),
    }
}

fn entry_value(entry: &Value) -> Value {
    match entry.get("value") {
        Some(value) => value.clone(),
        None => entry.clone(),
    }
}
