// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed [`Store`].
//!
//! Document layout:
//! - `user_profiles/{user_id}`: profile with credential fields
//! - `fitbit_data/{user_id}_{date}`: daily metric records
//! - `user_devices/{user_id}_{device_id}`: device metadata
//! - `sync_queue/{user_id}_{date}_{collection}`: webhook sync requests

use crate::db::{collections, Store};
use crate::error::AppError;
use crate::models::{Credential, DailyMetricRecord, DeviceRecord, SyncRequest, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use firestore::paths;
use std::collections::HashSet;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| {
                AppError::Persistence(format!("Failed to connect to Firestore: {}", e))
            })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Persistence(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    /// Load a profile that must exist.
    async fn require_profile(&self, user_id: &str) -> Result<UserProfile, AppError> {
        self.get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {}", user_id)))
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── Profile Operations ──────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USER_PROFILES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::USER_PROFILES)
            .document_id(&profile.user_id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn set_credential(
        &self,
        user_id: &str,
        credential: Option<&Credential>,
    ) -> Result<(), AppError> {
        let mut profile = self.require_profile(user_id).await?;
        profile.set_credential(credential);

        // Only the credential fields are written, all three in one update.
        let _: () = self
            .client
            .fluent()
            .update()
            .fields(paths!(UserProfile::{
                fitbit_access_token,
                fitbit_refresh_token,
                token_expires_at
            }))
            .in_col(collections::USER_PROFILES)
            .document_id(user_id)
            .object(&profile)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn set_last_sync_at(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut profile = self.require_profile(user_id).await?;
        profile.last_sync_at = Some(at);

        // Must not touch the credential: a concurrent refresh may have rotated it.
        let _: () = self
            .client
            .fluent()
            .update()
            .fields(paths!(UserProfile::{last_sync_at}))
            .in_col(collections::USER_PROFILES)
            .document_id(user_id)
            .object(&profile)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn list_connected_participants(&self) -> Result<Vec<UserProfile>, AppError> {
        let participants: Vec<UserProfile> = self
            .client
            .fluent()
            .select()
            .from(collections::USER_PROFILES)
            .filter(|q| q.for_all([q.field("role").eq("participant")]))
            .order_by([("user_id", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        Ok(participants
            .into_iter()
            .filter(|p| p.credential().is_some())
            .collect())
    }

    // ─── Daily Metric Operations ─────────────────────────────────

    async fn upsert_daily_metrics(&self, record: &DailyMetricRecord) -> Result<(), AppError> {
        // Full-document write on the composite ID: a re-sync overwrites in place.
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::FITBIT_DATA)
            .document_id(record.document_id())
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn get_daily_metrics(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMetricRecord>, AppError> {
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();

        self.client
            .fluent()
            .select()
            .from(collections::FITBIT_DATA)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("date").greater_than_or_equal(from.clone()),
                    q.field("date").less_than_or_equal(to.clone()),
                ])
            })
            .order_by([("date", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    // ─── Device Operations ───────────────────────────────────────

    async fn replace_devices(
        &self,
        user_id: &str,
        devices: &[DeviceRecord],
    ) -> Result<(), AppError> {
        let client = &self.client;
        let existing = self.get_devices(user_id).await?;

        // Documents that get rewritten are not deleted first: a commit may
        // touch each document only once.
        let keep: HashSet<String> = devices.iter().map(DeviceRecord::document_id).collect();
        let stale: Vec<&DeviceRecord> = existing
            .iter()
            .filter(|d| !keep.contains(&d.document_id()))
            .collect();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to begin transaction: {}", e)))?;

        for device in &stale {
            client
                .fluent()
                .delete()
                .from(collections::USER_DEVICES)
                .document_id(device.document_id())
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Persistence(format!(
                        "Failed to add device deletion to transaction: {}",
                        e
                    ))
                })?;
        }

        for device in devices {
            client
                .fluent()
                .update()
                .in_col(collections::USER_DEVICES)
                .document_id(device.document_id())
                .object(device)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Persistence(format!("Failed to add device to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Persistence(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(
            user_id,
            removed = stale.len(),
            stored = devices.len(),
            "Device set replaced"
        );

        Ok(())
    }

    async fn get_devices(&self, user_id: &str) -> Result<Vec<DeviceRecord>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::USER_DEVICES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    // ─── Sync Queue ──────────────────────────────────────────────

    async fn enqueue_sync(&self, request: &SyncRequest) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::SYNC_QUEUE)
            .document_id(request.document_id())
            .object(request)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }
}
