// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Caller did not present the sync API secret.
    #[error("Authentication required")]
    Unauthorized,

    /// The participant has no usable Fitbit credential.
    #[error("Missing or invalid credential: {0}")]
    Auth(String),

    /// The refresh (or code) exchange with the token endpoint failed.
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Fitbit API error: {0}")]
    UpstreamFetch(String),

    #[error("Invalid device data: {0}")]
    InvalidDeviceData(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Persistence(String),
}

impl AppError {
    /// Whether this error means the participant's credential is unusable
    /// for the rest of the current sync cycle.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, AppError::Auth(_) | AppError::TokenRefresh(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, "auth_error", Some(msg.clone())),
            AppError::TokenRefresh(msg) => {
                tracing::warn!(error = %msg, "Token refresh failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "token_refresh_failed",
                    Some(msg.clone()),
                )
            }
            AppError::UpstreamFetch(msg) => {
                (StatusCode::BAD_GATEWAY, "fitbit_error", Some(msg.clone()))
            }
            AppError::InvalidDeviceData(msg) => (
                StatusCode::BAD_GATEWAY,
                "invalid_device_data",
                Some(msg.clone()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Persistence(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
