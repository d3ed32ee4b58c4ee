// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync trigger and data query routes.
//!
//! The sync secret middleware is applied in routes/mod.rs for these routes.

use crate::error::{AppError, Result};
use crate::models::{
    BatchSyncResult, DailyMetricRecord, DeviceRecord, ParticipantSyncResult, UserProfile,
};
use crate::services::DeviceSyncResult;
use crate::time_utils::trailing_window;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync", post(sync_metrics))
        .route("/sync/devices", post(sync_devices))
        .route("/participants/{user_id}/metrics", get(get_metrics))
        .route("/participants/{user_id}/devices", get(get_devices))
}

// ─── Sync Triggers ───────────────────────────────────────────

/// Participant selector in a sync request body.
#[derive(Debug, Deserialize)]
struct ParticipantRef {
    user_id: String,
}

/// Sync request body. An empty body means "every connected participant".
#[derive(Debug, Default, Deserialize)]
struct SyncBody {
    #[serde(default)]
    participants: Option<Vec<ParticipantRef>>,
}

fn parse_body(body: &Bytes) -> Result<SyncBody> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SyncBody::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid body: {}", e)))
}

/// Participants a sync request targets, plus listed IDs with no profile.
#[derive(Debug, Default)]
struct Selection {
    participants: Vec<UserProfile>,
    unknown: Vec<String>,
}

impl Selection {
    fn not_found(user_id: &str) -> String {
        AppError::NotFound(format!("User {} not found", user_id)).to_string()
    }
}

/// Resolve the participants a sync request targets.
///
/// Explicitly listed researchers are dropped; unknown IDs are reported
/// back per user rather than failing the whole request.
async fn select_participants(state: &AppState, body: SyncBody) -> Result<Selection> {
    let Some(refs) = body.participants else {
        return Ok(Selection {
            participants: state.store.list_connected_participants().await?,
            unknown: Vec::new(),
        });
    };

    let mut selection = Selection::default();
    for r in refs {
        match state.store.get_profile(&r.user_id).await? {
            Some(profile) if profile.is_participant() => selection.participants.push(profile),
            Some(_) => tracing::debug!(user_id = %r.user_id, "Skipping non-participant"),
            None => {
                tracing::warn!(user_id = %r.user_id, "Sync requested for unknown user");
                selection.unknown.push(r.user_id);
            }
        }
    }
    Ok(selection)
}

/// Run a health metric batch sync.
async fn sync_metrics(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<BatchSyncResult>> {
    let body = parse_body(&body)?;
    let selection = select_participants(&state, body).await?;

    let mut result = state.sync_engine.sync_all(&selection.participants).await;
    result.results.extend(selection.unknown.iter().map(|user_id| {
        ParticipantSyncResult::aborted(user_id.as_str(), Selection::not_found(user_id))
    }));
    Ok(Json(result))
}

/// Run a device sync for the selected participants concurrently.
async fn sync_devices(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Vec<DeviceSyncResult>>> {
    let body = parse_body(&body)?;
    let selection = select_participants(&state, body).await?;

    let mut results = state
        .device_syncer
        .sync_devices_for_all(&selection.participants)
        .await;
    results.extend(selection.unknown.iter().map(|user_id| DeviceSyncResult {
        user_id: user_id.clone(),
        devices: None,
        error: Some(Selection::not_found(user_id)),
    }));
    Ok(Json(results))
}

// ─── Stored Data ─────────────────────────────────────────────

/// Date range for metric queries. Defaults to the sync window ending today.
#[derive(Debug, Deserialize)]
struct MetricsQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

/// Stored daily metric records for one participant.
async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Vec<DailyMetricRecord>>> {
    let to = query.to.unwrap_or_else(|| Utc::now().date_naive());
    let from = match query.from {
        Some(from) => from,
        None => trailing_window(to, state.config.sync.window_days)
            .first()
            .copied()
            .unwrap_or(to),
    };

    if from > to {
        return Err(AppError::BadRequest(format!(
            "from ({}) is after to ({})",
            from, to
        )));
    }

    let records = state.store.get_daily_metrics(&user_id, from, to).await?;
    Ok(Json(records))
}

/// Stored devices for one participant. Researchers have none.
async fn get_devices(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<DeviceRecord>>> {
    let profile = state
        .store
        .get_profile(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    if !profile.is_participant() {
        return Ok(Json(Vec::new()));
    }

    Ok(Json(state.store.get_devices(&user_id).await?))
}
