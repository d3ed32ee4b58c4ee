//! In-memory store for local development and tests.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Credential, DailyMetricRecord, DeviceRecord, SyncRequest, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Store backed by concurrent hash maps. Cloning shares the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    profiles: DashMap<String, UserProfile>,
    metrics: DashMap<(String, NaiveDate), DailyMetricRecord>,
    devices: DashMap<String, Vec<DeviceRecord>>,
    sync_queue: DashMap<String, SyncRequest>,
    /// When set, metric upserts fail (used to exercise persistence errors).
    fail_metric_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent metric upserts fail until cleared.
    pub fn set_fail_metric_writes(&self, fail: bool) {
        self.inner.fail_metric_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored metric records across all users.
    pub fn metric_count(&self) -> usize {
        self.inner.metrics.len()
    }

    /// Snapshot of queued sync requests.
    pub fn pending_sync_requests(&self) -> Vec<SyncRequest> {
        let mut requests: Vec<SyncRequest> = self
            .inner
            .sync_queue
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        requests.sort_by(|a, b| (&a.user_id, a.date).cmp(&(&b.user_id, b.date)));
        requests
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.inner.profiles.get(user_id).map(|p| p.value().clone()))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        self.inner
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn set_credential(
        &self,
        user_id: &str,
        credential: Option<&Credential>,
    ) -> Result<(), AppError> {
        let mut profile = self
            .inner
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {}", user_id)))?;
        profile.set_credential(credential);
        Ok(())
    }

    async fn set_last_sync_at(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut profile = self
            .inner
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {}", user_id)))?;
        profile.last_sync_at = Some(at);
        Ok(())
    }

    async fn list_connected_participants(&self) -> Result<Vec<UserProfile>, AppError> {
        let mut participants: Vec<UserProfile> = self
            .inner
            .profiles
            .iter()
            .filter(|p| p.is_participant() && p.credential().is_some())
            .map(|p| p.value().clone())
            .collect();
        participants.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(participants)
    }

    async fn upsert_daily_metrics(&self, record: &DailyMetricRecord) -> Result<(), AppError> {
        if self.inner.fail_metric_writes.load(Ordering::SeqCst) {
            return Err(AppError::Persistence(
                "metric writes disabled".to_string(),
            ));
        }
        self.inner
            .metrics
            .insert((record.user_id.clone(), record.date), record.clone());
        Ok(())
    }

    async fn get_daily_metrics(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMetricRecord>, AppError> {
        let mut records: Vec<DailyMetricRecord> = self
            .inner
            .metrics
            .iter()
            .filter(|entry| {
                let (uid, date) = entry.key();
                uid == user_id && *date >= from && *date <= to
            })
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn replace_devices(
        &self,
        user_id: &str,
        devices: &[DeviceRecord],
    ) -> Result<(), AppError> {
        // Single map insert swaps the whole set, so readers never see a mix.
        self.inner
            .devices
            .insert(user_id.to_string(), devices.to_vec());
        Ok(())
    }

    async fn get_devices(&self, user_id: &str) -> Result<Vec<DeviceRecord>, AppError> {
        Ok(self
            .inner
            .devices
            .get(user_id)
            .map(|d| d.value().clone())
            .unwrap_or_default())
    }

    async fn enqueue_sync(&self, request: &SyncRequest) -> Result<(), AppError> {
        self.inner
            .sync_queue
            .insert(request.document_id(), request.clone());
        Ok(())
    }
}
