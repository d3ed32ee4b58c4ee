// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Fitbit subscription notifications.

use crate::middleware::auth::secrets_match;
use crate::models::SyncRequest;
use crate::services::subscriptions::parse_subscription_id;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", get(verify).post(handle_notifications))
}

/// Fitbit subscriber verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    verify: Option<String>,
}

/// Verify the subscriber endpoint (GET).
///
/// Fitbit expects 204 for the correct code and 404 for anything else.
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> StatusCode {
    match params.verify {
        Some(code) if secrets_match(&code, &state.config.fitbit_verification_code) => {
            tracing::info!("Webhook subscriber verified");
            StatusCode::NO_CONTENT
        }
        _ => {
            tracing::warn!("Webhook verification failed: invalid code");
            StatusCode::NOT_FOUND
        }
    }
}

/// One Fitbit notification.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Notification {
    collection_type: String,
    date: String,
    #[serde(default)]
    owner_id: Option<String>,
    subscription_id: String,
}

/// Handle a notification batch (POST).
///
/// Known participants get a pending sync request queued per notification.
/// Always answers 204 so Fitbit does not back off the subscriber.
async fn handle_notifications(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> StatusCode {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Webhook body is not JSON");
            return StatusCode::NO_CONTENT;
        }
    };

    // Fitbit posts a bare array; older relays wrap it in {"notifications": [...]}.
    let payload = match payload {
        serde_json::Value::Object(mut map) if map.contains_key("notifications") => {
            map.remove("notifications").unwrap_or_default()
        }
        other => other,
    };

    let notifications: Vec<Notification> = match serde_json::from_value(payload) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook notifications");
            return StatusCode::NO_CONTENT;
        }
    };

    tracing::info!(count = notifications.len(), "Webhook notifications received");

    for notification in notifications {
        let Some((user_id, _)) = parse_subscription_id(&notification.subscription_id) else {
            tracing::warn!(
                subscription_id = %notification.subscription_id,
                "Unrecognized subscription ID"
            );
            continue;
        };

        let Ok(date) = NaiveDate::parse_from_str(&notification.date, "%Y-%m-%d") else {
            tracing::warn!(user_id, date = %notification.date, "Invalid notification date");
            continue;
        };

        match state.store.get_profile(user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!(user_id, "Notification for unknown user");
                continue;
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to look up profile");
                continue;
            }
        }

        let request = SyncRequest::pending(user_id, date, notification.collection_type.as_str());
        match state.store.enqueue_sync(&request).await {
            Ok(()) => tracing::debug!(
                user_id,
                %date,
                collection = %request.collection_type,
                owner_id = ?notification.owner_id,
                "Sync request queued"
            ),
            Err(e) => tracing::error!(user_id, error = %e, "Failed to queue sync request"),
        }
    }

    StatusCode::NO_CONTENT
}
