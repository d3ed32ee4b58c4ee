//! Per-day health metric record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stored record in the `fitbit_data` collection, unique per (user_id, date).
///
/// Every modality is independently nullable: `None` means "not synced".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricRecord {
    pub user_id: String,
    /// Calendar date the metrics belong to (YYYY-MM-DD)
    pub date: NaiveDate,
    pub heart_rate: Option<HeartRate>,
    pub sleep: Option<Sleep>,
    pub hrv: Option<Value>,
    pub oxygen_saturation: Option<Value>,
    pub respiratory_rate: Option<Value>,
    pub temperature: Option<Value>,
    pub ecg: Option<Value>,
    pub synced_at: DateTime<Utc>,
}

impl DailyMetricRecord {
    /// Document ID; the composite key doubles as the upsert conflict target.
    pub fn document_id(&self) -> String {
        document_id(&self.user_id, self.date)
    }
}

/// Document ID for a (user_id, date) pair.
pub fn document_id(user_id: &str, date: NaiveDate) -> String {
    format!("{}_{}", user_id, date.format("%Y-%m-%d"))
}

/// Normalized heart-rate summary for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRate {
    /// Minutes-weighted average of zone midpoints, rounded
    pub average: Option<i64>,
    pub resting_heart_rate: Option<i64>,
    pub zones: Vec<HeartRateZone>,
}

/// One heart-rate zone as reported by Fitbit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateZone {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories_out: Option<f64>,
}

/// Normalized main-sleep session for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sleep {
    /// Duration in milliseconds
    pub duration: u64,
    pub efficiency: Option<i64>,
    /// Stage summary (`stages` or `classic` shape, kept verbatim)
    pub stages: Value,
    /// Per-interval stage sequence
    pub minute_data: Vec<SleepLevel>,
}

/// One entry of the sleep stage sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepLevel {
    pub date_time: String,
    pub level: String,
    pub seconds: u32,
}
