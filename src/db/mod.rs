//! Persistence layer.
//!
//! The sync engine talks to storage only through the [`Store`] trait so the
//! same engine runs against Firestore in production and the in-memory store
//! in local development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{Credential, DailyMetricRecord, DeviceRecord, SyncRequest, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Collection names as constants.
pub mod collections {
    pub const USER_PROFILES: &str = "user_profiles";
    /// Daily metric records (keyed by `{user_id}_{date}`)
    pub const FITBIT_DATA: &str = "fitbit_data";
    pub const USER_DEVICES: &str = "user_devices";
    pub const SYNC_QUEUE: &str = "sync_queue";
}

/// Record store used by the sync engine and routes.
///
/// Every write targets a uniquely keyed document; implementations must make
/// each individual write atomic.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get a profile by user ID.
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;

    /// Create or overwrite a profile.
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError>;

    /// Replace all three credential fields (or clear them with `None`).
    ///
    /// Fails with `NotFound` if the profile does not exist.
    async fn set_credential(
        &self,
        user_id: &str,
        credential: Option<&Credential>,
    ) -> Result<(), AppError>;

    /// Record the last successful sync time for a user.
    async fn set_last_sync_at(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), AppError>;

    /// All participants that currently hold a complete credential.
    async fn list_connected_participants(&self) -> Result<Vec<UserProfile>, AppError>;

    /// Insert or overwrite the record for (user_id, date).
    async fn upsert_daily_metrics(&self, record: &DailyMetricRecord) -> Result<(), AppError>;

    /// Records for a user with `from <= date <= to`, ordered by date.
    async fn get_daily_metrics(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMetricRecord>, AppError>;

    /// Delete every device for the user, then insert `devices`.
    async fn replace_devices(
        &self,
        user_id: &str,
        devices: &[DeviceRecord],
    ) -> Result<(), AppError>;

    async fn get_devices(&self, user_id: &str) -> Result<Vec<DeviceRecord>, AppError>;

    /// Queue a sync request (webhook ingress).
    async fn enqueue_sync(&self, request: &SyncRequest) -> Result<(), AppError>;
}
