// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit API access with token lifecycle management.
//!
//! Handles:
//! - Refresh-token and authorization-code exchanges at the token endpoint
//! - Persisting rotated credentials on the participant profile
//! - Pre-emptive refresh shortly before expiry
//! - One refresh-and-retry when Fitbit answers 401

use crate::config::FitbitConfig;
use crate::db::Store;
use crate::error::AppError;
use crate::models::Credential;
use crate::services::transport::{HttpTransport, ProviderRequest, ProviderResponse};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{Duration, NaiveDate, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;

/// Margin before token expiration when we proactively refresh (1 minute).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Web API paths, relative to the configured base URL.
pub mod endpoints {
    use chrono::NaiveDate;

    pub const DEVICES: &str = "/1/user/-/devices.json";
    pub const SUBSCRIPTIONS: &str = "/1/user/-/apiSubscriptions.json";

    pub fn heart_rate(date: NaiveDate) -> String {
        format!(
            "/1/user/-/activities/heart/date/{}/1d.json",
            date.format("%Y-%m-%d")
        )
    }

    pub fn sleep(date: NaiveDate) -> String {
        format!("/1.2/user/-/sleep/date/{}.json", date.format("%Y-%m-%d"))
    }

    pub fn create_subscription(collection: &str, subscription_id: &str) -> String {
        format!(
            "/1/user/-/{}/apiSubscriptions/{}.json",
            collection,
            urlencoding::encode(subscription_id)
        )
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    /// Lifetime of the access token in seconds
    expires_in: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// TokenRefresher - token endpoint exchanges
// ─────────────────────────────────────────────────────────────────────────────

/// Exchanges refresh tokens (and authorization codes) for new credentials
/// and stores them on the participant's profile.
#[derive(Clone)]
pub struct TokenRefresher {
    config: FitbitConfig,
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn Store>,
}

impl TokenRefresher {
    pub fn new(
        config: FitbitConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
        }
    }

    /// Exchange a refresh token for a new credential and persist it.
    ///
    /// Fitbit rotates the refresh token on every exchange, so the returned
    /// credential replaces the old one entirely. Callers must not store it
    /// again.
    pub async fn refresh(&self, user_id: &str, refresh_token: &str) -> Result<Credential, AppError> {
        let credential = self
            .request_tokens(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        self.store.set_credential(user_id, Some(&credential)).await?;
        tracing::info!(user_id, expires_at = %credential.expires_at, "Fitbit token refreshed");

        Ok(credential)
    }

    /// Exchange an OAuth authorization code (first connect) and persist the result.
    pub async fn exchange_code(&self, user_id: &str, code: &str) -> Result<Credential, AppError> {
        let credential = self
            .request_tokens(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .await?;

        self.store.set_credential(user_id, Some(&credential)).await?;
        tracing::info!(user_id, "Fitbit account connected");

        Ok(credential)
    }

    /// POST to the token endpoint with client-credential Basic auth.
    async fn request_tokens(&self, fields: &[(&str, &str)]) -> Result<Credential, AppError> {
        let request = ProviderRequest::post(&self.config.token_url)
            .header("Authorization", self.basic_auth())
            .form(fields);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AppError::TokenRefresh(format!("Token request failed: {}", e)))?;

        if !response.is_success() {
            tracing::warn!(
                status = %response.status,
                body = %response.body,
                "Fitbit token endpoint rejected exchange"
            );
            return Err(AppError::TokenRefresh(format!(
                "Token endpoint returned {}",
                response.status
            )));
        }

        let tokens: TokenResponse = serde_json::from_str(&response.body).map_err(|e| {
            AppError::TokenRefresh(format!("Failed to parse token response: {}", e))
        })?;

        Ok(Credential {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
        })
    }

    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", BASE64.encode(raw))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FitbitClient - authenticated requests
// ─────────────────────────────────────────────────────────────────────────────

/// Authenticated Fitbit API client.
///
/// Credentials are passed per call and updated in place when refreshed, so
/// a caller making several requests always uses the latest token pair.
#[derive(Clone)]
pub struct FitbitClient {
    transport: Arc<dyn HttpTransport>,
    refresher: TokenRefresher,
    api_base_url: String,
}

impl FitbitClient {
    pub fn new(
        config: &FitbitConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            transport: transport.clone(),
            refresher: TokenRefresher::new(config.clone(), transport, store),
            api_base_url: config.api_base_url.clone(),
        }
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    /// Send a request with Bearer auth, refreshing the credential as needed.
    ///
    /// 1. Refresh first if the token expires within the margin.
    /// 2. Send the request.
    /// 3. On 401, refresh once and retry once; the retry's response is
    ///    returned whatever its status.
    ///
    /// Non-401 statuses are returned untouched. Errors only come from a
    /// failed refresh or a transport failure.
    pub async fn fetch(
        &self,
        user_id: &str,
        credential: &mut Credential,
        mut request: ProviderRequest,
    ) -> Result<ProviderResponse, AppError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        if credential.expires_at - Utc::now() < margin {
            tracing::info!(user_id, "Access token expiring, refreshing before request");
            *credential = self
                .refresher
                .refresh(user_id, &credential.refresh_token)
                .await?;
        }

        request.set_header("Authorization", format!("Bearer {}", credential.access_token));
        let response = self.transport.send(request.clone()).await?;

        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!(
            user_id,
            url = %request.url,
            "Fitbit rejected access token (401), refreshing and retrying once"
        );

        *credential = self
            .refresher
            .refresh(user_id, &credential.refresh_token)
            .await?;
        request.set_header("Authorization", format!("Bearer {}", credential.access_token));

        self.transport.send(request).await
    }

    /// GET an API path.
    pub async fn get(
        &self,
        user_id: &str,
        credential: &mut Credential,
        path: &str,
    ) -> Result<ProviderResponse, AppError> {
        self.fetch(user_id, credential, ProviderRequest::get(self.url(path)))
            .await
    }

    /// Heart-rate summary for one day.
    pub async fn get_heart_rate(
        &self,
        user_id: &str,
        credential: &mut Credential,
        date: NaiveDate,
    ) -> Result<ProviderResponse, AppError> {
        self.get(user_id, credential, &endpoints::heart_rate(date))
            .await
    }

    /// Sleep log for one day.
    pub async fn get_sleep(
        &self,
        user_id: &str,
        credential: &mut Credential,
        date: NaiveDate,
    ) -> Result<ProviderResponse, AppError> {
        self.get(user_id, credential, &endpoints::sleep(date)).await
    }
}
