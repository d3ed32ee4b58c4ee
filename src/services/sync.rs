// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Health metric sync engine.
//!
//! Pulls heart rate and sleep for a trailing window of days per participant,
//! normalizes them, and upserts one [`DailyMetricRecord`] per (user, date).
//! Dates and participants are processed strictly one after another with a
//! pacing delay between dates to stay under Fitbit's rate limits.

use crate::config::SyncConfig;
use crate::db::Store;
use crate::error::AppError;
use crate::models::{
    BatchSyncResult, Credential, DailyMetricRecord, ParticipantSyncResult, SyncOutcome,
    UserProfile,
};
use crate::services::fitbit::FitbitClient;
use crate::services::normalize::{normalize_heart_rate, normalize_sleep};
use crate::services::transport::ProviderResponse;
use crate::time_utils::trailing_window;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Batch orchestrator and per-day syncer.
#[derive(Clone)]
pub struct SyncEngine {
    client: FitbitClient,
    store: Arc<dyn Store>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(client: FitbitClient, store: Arc<dyn Store>, config: SyncConfig) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    // ─── Single day ──────────────────────────────────────────────

    /// Sync one participant for one date.
    ///
    /// Heart rate is fetched first and a non-2xx response stops the day
    /// before the sleep request is made. The credential is updated in place
    /// if a refresh happened.
    pub async fn try_sync_day(
        &self,
        user_id: &str,
        date: NaiveDate,
        credential: &mut Credential,
    ) -> Result<(), AppError> {
        let heart = self.client.get_heart_rate(user_id, credential, date).await?;
        let heart = ok_json(&heart, "heart rate")?;

        let sleep = self.client.get_sleep(user_id, credential, date).await?;
        let sleep = ok_json(&sleep, "sleep")?;

        let record = DailyMetricRecord {
            user_id: user_id.to_string(),
            date,
            heart_rate: normalize_heart_rate(&heart),
            sleep: normalize_sleep(&sleep),
            // Not fetched by the daily sync yet.
            hrv: None,
            oxygen_saturation: None,
            respiratory_rate: None,
            temperature: None,
            ecg: None,
            synced_at: Utc::now(),
        };

        self.store.upsert_daily_metrics(&record).await?;

        tracing::debug!(
            user_id,
            %date,
            has_heart_rate = record.heart_rate.is_some(),
            has_sleep = record.sleep.is_some(),
            "Day synced"
        );

        Ok(())
    }

    /// Like [`try_sync_day`](Self::try_sync_day) but never fails: errors are
    /// logged and reported as `false`.
    pub async fn sync_day(&self, user_id: &str, date: NaiveDate, credential: &mut Credential) -> bool {
        match self.try_sync_day(user_id, date, credential).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user_id, %date, error = %e, "Day sync failed");
                false
            }
        }
    }

    // ─── Batch ───────────────────────────────────────────────────

    /// Sync every participant over the window ending today (UTC).
    pub async fn sync_all(&self, participants: &[UserProfile]) -> BatchSyncResult {
        self.sync_all_ending(participants, Utc::now().date_naive())
            .await
    }

    /// Sync every participant over the window ending at `end`.
    ///
    /// Never fails: per-date and per-participant failures are recorded in
    /// the returned result.
    pub async fn sync_all_ending(&self, participants: &[UserProfile], end: NaiveDate) -> BatchSyncResult {
        let dates = trailing_window(end, self.config.window_days);
        let mut results = Vec::with_capacity(participants.len());

        tracing::info!(
            participants = participants.len(),
            days = dates.len(),
            %end,
            "Starting batch sync"
        );

        for (n, profile) in participants.iter().enumerate() {
            results.push(self.sync_participant(profile, &dates, n > 0).await);
        }

        let batch = BatchSyncResult {
            success: true,
            results,
        };

        tracing::info!(
            participants = batch.results.len(),
            failures = batch.failure_count(),
            "Batch sync finished"
        );

        batch
    }

    /// Sync all connected participants from the store.
    pub async fn sync_connected(&self) -> Result<BatchSyncResult, AppError> {
        let participants = self.store.list_connected_participants().await?;
        Ok(self.sync_all(&participants).await)
    }

    /// Sync one participant over `dates`. `follows_previous` is set when an
    /// earlier participant in the batch already made requests, so the first
    /// date is paced too.
    async fn sync_participant(
        &self,
        profile: &UserProfile,
        dates: &[NaiveDate],
        follows_previous: bool,
    ) -> ParticipantSyncResult {
        let user_id = profile.user_id.as_str();

        let Some(mut credential) = profile.credential() else {
            let error = AppError::Auth(format!("No Fitbit credential for user {}", user_id));
            tracing::warn!(user_id, error = %error, "Skipping participant");
            return ParticipantSyncResult::aborted(user_id, error.to_string());
        };

        let mut outcomes = Vec::with_capacity(dates.len());
        // Set once the credential is unusable; later dates fail without a request.
        let mut exhausted: Option<String> = None;
        for (i, &date) in dates.iter().enumerate() {
            if let Some(error) = &exhausted {
                outcomes.push(SyncOutcome::failed(date, error.clone()));
                continue;
            }
            if i > 0 || follows_previous {
                self.pace().await;
            }

            let outcome = match self.try_sync_day(user_id, date, &mut credential).await {
                Ok(()) => SyncOutcome::succeeded(date),
                Err(e) => {
                    tracing::warn!(user_id, %date, error = %e, "Day sync failed");
                    if e.is_credential_error() {
                        tracing::warn!(
                            user_id,
                            remaining = dates.len() - i - 1,
                            "Credential unusable, skipping remaining dates"
                        );
                        exhausted = Some(e.to_string());
                    }
                    SyncOutcome::failed(date, e.to_string())
                }
            };
            outcomes.push(outcome);
        }

        let result = ParticipantSyncResult {
            user_id: user_id.to_string(),
            results: outcomes,
            error: None,
        };

        if result.any_succeeded() {
            if let Err(e) = self.store.set_last_sync_at(user_id, Utc::now()).await {
                tracing::error!(user_id, error = %e, "Failed to update last sync time");
            }
        }

        tracing::info!(
            user_id,
            succeeded = result.succeeded(),
            failed = result.failed(),
            "Participant sync finished"
        );

        result
    }

    /// Pause between consecutive dates, across participant boundaries.
    async fn pace(&self) {
        if !self.config.pacing.is_zero() {
            tokio::time::sleep(self.config.pacing).await;
        }
    }
}

/// Parse a data endpoint response, treating any non-2xx as an upstream failure.
fn ok_json(response: &ProviderResponse, what: &str) -> Result<Value, AppError> {
    if !response.is_success() {
        return Err(AppError::UpstreamFetch(format!(
            "Failed to fetch {} data: {}",
            what, response.status
        )));
    }
    response.json()
}
