// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared-secret authentication for the sync and data routes.
//!
//! Callers (the scheduler and the researcher portal backend) send
//! `Authorization: Bearer <SYNC_API_SECRET>`.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Middleware that requires the sync API secret as a Bearer token.
pub async fn require_sync_secret(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        tracing::debug!(path = %request.uri().path(), "Missing bearer token");
        return Err(AppError::Unauthorized);
    };

    if !secrets_match(token, &state.config.sync_api_secret) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid sync secret");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Constant-time comparison of a presented secret against the expected one.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
