// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device metadata sync.
//!
//! Fetches a participant's paired devices and replaces the stored set so
//! devices removed on the Fitbit side do not linger.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{BatteryStatus, Credential, DeviceRecord, DeviceType, UserProfile};
use crate::services::fitbit::{endpoints, FitbitClient};
use crate::time_utils::parse_provider_timestamp;
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Per-participant outcome of a device sync batch.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSyncResult {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<DeviceRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct DeviceSyncer {
    client: FitbitClient,
    store: Arc<dyn Store>,
}

impl DeviceSyncer {
    pub fn new(client: FitbitClient, store: Arc<dyn Store>) -> Self {
        Self { client, store }
    }

    /// Fetch and store the participant's devices.
    ///
    /// Researchers have no devices: they get an empty list and Fitbit is not
    /// called. A payload that is not a JSON array fails with
    /// `InvalidDeviceData` and leaves the stored devices untouched.
    pub async fn sync_devices(
        &self,
        user_id: &str,
        credential: &mut Credential,
    ) -> Result<Vec<DeviceRecord>, AppError> {
        let profile = self
            .store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {}", user_id)))?;

        if !profile.is_participant() {
            tracing::info!(user_id, "Skipping device sync for non-participant");
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(user_id, credential, endpoints::DEVICES)
            .await?;

        if !response.is_success() {
            return Err(AppError::UpstreamFetch(format!(
                "Failed to fetch devices: {} - {}",
                response.status, response.body
            )));
        }

        let payload: Value = response.json()?;
        let Value::Array(entries) = payload else {
            return Err(AppError::InvalidDeviceData(format!(
                "expected a device list, got: {}",
                payload
            )));
        };

        let devices: Vec<DeviceRecord> = entries
            .iter()
            .filter_map(|raw| parse_device(user_id, raw))
            .collect();

        self.store.replace_devices(user_id, &devices).await?;

        tracing::info!(
            user_id,
            received = entries.len(),
            stored = devices.len(),
            "Devices synced"
        );

        Ok(devices)
    }

    /// Sync devices for every participant concurrently.
    ///
    /// One participant's failure does not affect the others; each gets its
    /// own entry in the result, in input order.
    pub async fn sync_devices_for_all(&self, participants: &[UserProfile]) -> Vec<DeviceSyncResult> {
        let tasks = participants.iter().map(|profile| async move {
            let user_id = profile.user_id.clone();
            let result = match profile.credential() {
                Some(mut credential) => self.sync_devices(&user_id, &mut credential).await,
                None => Err(AppError::Auth(format!(
                    "No Fitbit credential for user {}",
                    user_id
                ))),
            };

            match result {
                Ok(devices) => DeviceSyncResult {
                    user_id,
                    devices: Some(devices),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Device sync failed");
                    DeviceSyncResult {
                        user_id,
                        devices: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        });

        join_all(tasks).await
    }
}

/// Build a device record from one entry of the devices payload.
///
/// Entries without an `id` are skipped.
fn parse_device(user_id: &str, raw: &Value) -> Option<DeviceRecord> {
    let device_id = match raw.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            tracing::warn!(user_id, device = %raw, "Device missing ID, skipping");
            return None;
        }
    };

    let battery_level = match raw.get("batteryLevel") {
        None | Some(Value::Null) => None,
        Some(level) => {
            let parsed = parse_battery_level(level);
            if parsed.is_none() {
                tracing::warn!(user_id, device_id = %device_id, battery_level = %level, "Invalid battery level");
            }
            parsed
        }
    };

    let qualitative = raw.get("battery").and_then(Value::as_str);

    Some(DeviceRecord {
        user_id: user_id.to_string(),
        device_version: str_field(raw, "deviceVersion"),
        device_type: DeviceType::from_provider(raw.get("type").and_then(Value::as_str)),
        battery: battery_status(qualitative, battery_level),
        battery_level,
        last_sync_time: raw
            .get("lastSyncTime")
            .and_then(Value::as_str)
            .and_then(parse_provider_timestamp),
        mac: str_field(raw, "mac"),
        features: raw
            .get("features")
            .and_then(Value::as_array)
            .map(|f| f.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default(),
        device_id,
    })
}

fn str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a battery percentage from a number or numeric string.
///
/// Fractions are truncated. Values outside 0..=100 are rejected.
pub fn parse_battery_level(raw: &Value) -> Option<u8> {
    let level = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !(0.0..=100.0).contains(&level) {
        return None;
    }
    Some(level.trunc() as u8)
}

/// Battery bucket: the provider's qualitative field wins when present,
/// otherwise the numeric level is bucketed.
pub fn battery_status(qualitative: Option<&str>, level: Option<u8>) -> BatteryStatus {
    match (qualitative, level) {
        (Some(raw), _) if !raw.is_empty() => BatteryStatus::from_provider(raw),
        (_, Some(level)) => BatteryStatus::from_level(level),
        _ => BatteryStatus::Empty,
    }
}
