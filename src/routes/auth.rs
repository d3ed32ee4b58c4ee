// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit OAuth connect/disconnect routes.
//!
//! The portal frontend completes the Fitbit authorization redirect and
//! hands the code to its backend, which calls these routes with the sync
//! secret.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::UserProfile;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/fitbit/exchange", post(exchange))
        .route("/auth/fitbit/disconnect", post(disconnect))
}

#[derive(Deserialize)]
struct ExchangeRequest {
    user_id: String,
    code: String,
}

#[derive(Serialize)]
struct ExchangeResponse {
    user_id: String,
    connected: bool,
    /// Subscriptions created during this connect (empty if all existed
    /// or if subscription setup failed)
    subscriptions_created: Vec<String>,
}

async fn require_participant(state: &AppState, user_id: &str) -> Result<UserProfile> {
    let profile = state
        .store
        .get_profile(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    if !profile.is_participant() {
        return Err(AppError::BadRequest(format!(
            "User {} is not a participant",
            user_id
        )));
    }
    Ok(profile)
}

/// Exchange an authorization code and set up notification subscriptions.
async fn exchange(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExchangeRequest>,
) -> Result<Json<ExchangeResponse>> {
    if body.code.trim().is_empty() {
        return Err(AppError::BadRequest("Missing authorization code".to_string()));
    }
    require_participant(&state, &body.user_id).await?;

    let mut credential = state
        .fitbit
        .refresher()
        .exchange_code(&body.user_id, body.code.trim())
        .await?;

    // Subscriptions are best-effort: the periodic sync still covers the user.
    let subscriptions_created = match state
        .subscriptions
        .ensure_subscriptions(&body.user_id, &mut credential)
        .await
    {
        Ok(created) => created,
        Err(e) => {
            tracing::warn!(user_id = %body.user_id, error = %e, "Subscription setup failed");
            Vec::new()
        }
    };

    Ok(Json(ExchangeResponse {
        user_id: body.user_id,
        connected: true,
        subscriptions_created,
    }))
}

#[derive(Deserialize)]
struct DisconnectRequest {
    user_id: String,
}

/// Clear the participant's stored credential.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DisconnectRequest>,
) -> Result<StatusCode> {
    require_participant(&state, &body.user_id).await?;
    state.store.set_credential(&body.user_id, None).await?;

    tracing::info!(user_id = %body.user_id, "Fitbit account disconnected");
    Ok(StatusCode::NO_CONTENT)
}
