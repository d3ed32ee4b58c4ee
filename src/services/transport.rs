// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP transport used for every Fitbit call.
//!
//! The sync engine only ever sees [`ProviderRequest`] and [`ProviderResponse`],
//! so tests can script the provider without a network.

use crate::error::AppError;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

/// An outbound request to the provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ProviderRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set an `application/x-www-form-urlencoded` body.
    pub fn form(self, fields: &[(&str, &str)]) -> Self {
        let body = encode_form(fields);
        let mut request = self.header("Content-Type", "application/x-www-form-urlencoded");
        request.body = Some(body);
        request
    }
}

/// Encode form fields as `k=v&k=v` with percent-encoding.
pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// A fully read provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ProviderResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_str(&self.body)
            .map_err(|e| AppError::UpstreamFetch(format!("JSON parse error: {}", e)))
    }
}

/// Sends provider requests. Implemented for `reqwest::Client`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and read the whole body.
    ///
    /// HTTP error statuses are returned as responses; only transport-level
    /// failures (connect, timeout, body read) are errors.
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, AppError>;
}

#[async_trait]
impl HttpTransport for reqwest::Client {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, AppError> {
        let mut builder = self.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            AppError::UpstreamFetch(format!("Request to {} failed: {}", request.url, e))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::UpstreamFetch(format!("Failed to read response body: {}", e)))?;

        Ok(ProviderResponse { status, body })
    }
}
