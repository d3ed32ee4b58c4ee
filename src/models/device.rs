//! Fitbit device metadata model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored device in the `user_devices` collection, keyed by (user_id, device_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub user_id: String,
    pub device_id: String,
    pub device_version: Option<String>,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Battery bucket shown in the UI
    pub battery: BatteryStatus,
    /// Battery percentage, `None` when missing or unparseable
    pub battery_level: Option<u8>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub mac: Option<String>,
    pub features: Vec<String>,
}

impl DeviceRecord {
    /// Document ID: unique per user and device.
    pub fn document_id(&self) -> String {
        format!("{}_{}", self.user_id, urlencoding::encode(&self.device_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    Tracker,
    Scale,
}

impl DeviceType {
    /// Anything that is not a scale is treated as a tracker.
    pub fn from_provider(raw: Option<&str>) -> Self {
        match raw {
            Some(t) if t.eq_ignore_ascii_case("scale") => DeviceType::Scale,
            _ => DeviceType::Tracker,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    High,
    Medium,
    Low,
    Empty,
}

impl BatteryStatus {
    /// Bucket a battery percentage.
    pub fn from_level(level: u8) -> Self {
        match level {
            75.. => BatteryStatus::High,
            50..=74 => BatteryStatus::Medium,
            25..=49 => BatteryStatus::Low,
            _ => BatteryStatus::Empty,
        }
    }

    /// Map Fitbit's qualitative battery field. Unknown values mean Empty.
    pub fn from_provider(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "high" | "full" => BatteryStatus::High,
            "medium" => BatteryStatus::Medium,
            "low" => BatteryStatus::Low,
            _ => BatteryStatus::Empty,
        }
    }
}
