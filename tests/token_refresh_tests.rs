// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle tests: pre-emptive refresh, 401 retry, persistence.

mod common;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Duration;
use common::{add_participant, credential, json_response, token_response, MockTransport};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use wearable_sync::config::Config;
use wearable_sync::db::{MemoryStore, Store};
use wearable_sync::error::AppError;
use wearable_sync::services::fitbit::endpoints;
use wearable_sync::services::FitbitClient;

fn client(transport: Arc<MockTransport>, store: &MemoryStore) -> FitbitClient {
    FitbitClient::new(&Config::test_default().fitbit, transport, Arc::new(store.clone()))
}

/// Fitbit that accepts only the given bearer tokens on data endpoints.
fn fitbit_accepting(valid: &'static [&'static str]) -> Arc<MockTransport> {
    let issued = AtomicUsize::new(0);
    MockTransport::new(move |request| {
        if request.url.ends_with("/oauth2/token") {
            return token_response(&issued);
        }
        let auth = request.header_value("Authorization").unwrap_or_default();
        if valid.iter().any(|t| auth == format!("Bearer {}", t)) {
            json_response(StatusCode::OK, json!({"ok": true}))
        } else {
            json_response(StatusCode::UNAUTHORIZED, json!({"errors": [{"errorType": "expired_token"}]}))
        }
    })
}

#[tokio::test]
async fn test_fresh_token_is_used_without_refresh() {
    let transport = fitbit_accepting(&["current"]);
    let store = MemoryStore::new();
    let mut cred = credential("current", Duration::hours(1));
    add_participant(&store, "p1", Some(&cred)).await;

    let response = client(transport.clone(), &store)
        .get("p1", &mut cred, endpoints::DEVICES)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(transport.token_requests(), 0);
    assert_eq!(cred.access_token, "current");
}

#[tokio::test]
async fn test_expiring_token_refreshes_once_before_request() {
    let transport = fitbit_accepting(&["access_1"]);
    let store = MemoryStore::new();
    let mut cred = credential("old", Duration::seconds(30));
    add_participant(&store, "p1", Some(&cred)).await;

    let response = client(transport.clone(), &store)
        .get("p1", &mut cred, endpoints::DEVICES)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(transport.token_requests(), 1);

    // The refresh happened before the only data request.
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].url.ends_with("/oauth2/token"));
    assert_eq!(
        requests[1].header_value("Authorization"),
        Some("Bearer access_1")
    );

    // Refresh request shape
    let expected_basic = format!("Basic {}", BASE64.encode("test_client_id:test_secret"));
    assert_eq!(requests[0].header_value("Authorization"), Some(expected_basic.as_str()));
    assert_eq!(
        requests[0].body.as_deref(),
        Some("grant_type=refresh_token&refresh_token=old_refresh")
    );

    // Caller's credential and the stored one both rotated.
    assert_eq!(cred.access_token, "access_1");
    assert_eq!(cred.refresh_token, "refresh_1");
    let stored = store.get_profile("p1").await.unwrap().unwrap();
    assert_eq!(stored.credential(), Some(cred));
}

#[tokio::test]
async fn test_unauthorized_triggers_one_refresh_and_one_retry() {
    let transport = fitbit_accepting(&["access_1"]);
    let store = MemoryStore::new();
    let mut cred = credential("revoked", Duration::hours(1));
    add_participant(&store, "p1", Some(&cred)).await;

    let response = client(transport.clone(), &store)
        .get("p1", &mut cred, endpoints::DEVICES)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(transport.token_requests(), 1);
    assert_eq!(transport.requests_to(endpoints::DEVICES).len(), 2);
    assert_eq!(cred.access_token, "access_1");
}

#[tokio::test]
async fn test_failed_retry_is_returned_not_retried_again() {
    let transport = fitbit_accepting(&[]);
    let store = MemoryStore::new();
    let mut cred = credential("revoked", Duration::hours(1));
    add_participant(&store, "p1", Some(&cred)).await;

    let response = client(transport.clone(), &store)
        .get("p1", &mut cred, endpoints::DEVICES)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(transport.token_requests(), 1);
    assert_eq!(transport.requests_to(endpoints::DEVICES).len(), 2);
}

#[tokio::test]
async fn test_other_error_statuses_pass_through() {
    let transport = MockTransport::new(|_| json_response(StatusCode::TOO_MANY_REQUESTS, json!({})));
    let store = MemoryStore::new();
    let mut cred = credential("current", Duration::hours(1));
    add_participant(&store, "p1", Some(&cred)).await;

    let response = client(transport.clone(), &store)
        .get("p1", &mut cred, endpoints::DEVICES)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(transport.token_requests(), 0);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_refresh_failure_is_token_refresh_error() {
    let transport = MockTransport::new(|request| {
        if request.url.ends_with("/oauth2/token") {
            json_response(StatusCode::BAD_REQUEST, json!({"errors": [{"errorType": "invalid_grant"}]}))
        } else {
            json_response(StatusCode::OK, json!({}))
        }
    });
    let store = MemoryStore::new();
    let original = credential("old", Duration::seconds(5));
    let mut cred = original.clone();
    add_participant(&store, "p1", Some(&cred)).await;

    let result = client(transport.clone(), &store)
        .get("p1", &mut cred, endpoints::DEVICES)
        .await;

    assert!(matches!(result, Err(AppError::TokenRefresh(_))));
    assert_eq!(transport.token_requests(), 1);
    assert!(transport.requests_to(endpoints::DEVICES).is_empty());

    // Nothing was overwritten.
    assert_eq!(cred, original);
    let stored = store.get_profile("p1").await.unwrap().unwrap();
    assert_eq!(stored.credential(), Some(original));
}

#[tokio::test]
async fn test_exchange_code_persists_credential() {
    let issued = AtomicUsize::new(0);
    let transport = MockTransport::new(move |_| token_response(&issued));
    let store = MemoryStore::new();
    add_participant(&store, "p1", None).await;

    let cred = client(transport.clone(), &store)
        .refresher()
        .exchange_code("p1", "auth-code")
        .await
        .unwrap();

    assert_eq!(cred.access_token, "access_1");
    let request = &transport.requests()[0];
    assert_eq!(
        request.body.as_deref(),
        Some("grant_type=authorization_code&code=auth-code&redirect_uri=http%3A%2F%2Flocalhost%3A5173%2Ffitbit%2Fcallback")
    );

    let stored = store.get_profile("p1").await.unwrap().unwrap();
    assert_eq!(stored.credential(), Some(cred));
}
