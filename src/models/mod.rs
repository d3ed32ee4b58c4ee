// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod device;
pub mod metrics;
pub mod sync;
pub mod user;

pub use device::{BatteryStatus, DeviceRecord, DeviceType};
pub use metrics::{DailyMetricRecord, HeartRate, HeartRateZone, Sleep, SleepLevel};
pub use sync::{BatchSyncResult, ParticipantSyncResult, SyncOutcome, SyncRequest};
pub use user::{Credential, Role, UserProfile};
