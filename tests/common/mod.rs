// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wearable_sync::config::Config;
use wearable_sync::db::{FirestoreDb, MemoryStore, Store};
use wearable_sync::error::AppError;
use wearable_sync::models::{Credential, Role, UserProfile};
use wearable_sync::routes::create_router;
use wearable_sync::services::{HttpTransport, ProviderRequest, ProviderResponse};
use wearable_sync::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Scripted Fitbit ─────────────────────────────────────────

type Handler = dyn Fn(&ProviderRequest) -> ProviderResponse + Send + Sync;

/// Transport that answers from a closure and records every request.
pub struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<ProviderRequest>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new(
        handler: impl Fn(&ProviderRequest) -> ProviderResponse + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose URL contains `needle`.
    pub fn requests_to(&self, needle: &str) -> Vec<ProviderRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(needle))
            .collect()
    }

    pub fn token_requests(&self) -> usize {
        self.requests_to("/oauth2/token").len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok((self.handler)(&request))
    }
}

#[allow(dead_code)]
pub fn json_response(status: StatusCode, body: Value) -> ProviderResponse {
    ProviderResponse::new(status, body.to_string())
}

/// Token endpoint success. Each call hands out a numbered token pair.
#[allow(dead_code)]
pub fn token_response(counter: &AtomicUsize) -> ProviderResponse {
    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
    json_response(
        StatusCode::OK,
        json!({
            "access_token": format!("access_{}", n),
            "refresh_token": format!("refresh_{}", n),
            "expires_in": 28800,
            "token_type": "Bearer",
            "user_id": "FITBIT1"
        }),
    )
}

/// Heart rate day with two populated zones (average 87).
#[allow(dead_code)]
pub fn heart_payload(resting: i64) -> Value {
    json!({
        "activities-heart": [{
            "dateTime": "2024-01-01",
            "value": {
                "restingHeartRate": resting,
                "heartRateZones": [
                    {"name": "Out of Range", "min": 30, "max": 90, "minutes": 10},
                    {"name": "Fat Burn", "min": 90, "max": 110, "minutes": 20}
                ]
            }
        }]
    })
}

#[allow(dead_code)]
pub fn sleep_payload(duration_ms: u64) -> Value {
    json!({
        "sleep": [{
            "isMainSleep": true,
            "duration": duration_ms,
            "efficiency": 91,
            "levels": {"summary": {"deep": {"minutes": 70}}, "data": []}
        }]
    })
}

// ─── Store Fixtures ──────────────────────────────────────────

#[allow(dead_code)]
pub fn credential(access: &str, expires_in: Duration) -> Credential {
    Credential {
        access_token: access.to_string(),
        refresh_token: format!("{}_refresh", access),
        expires_at: Utc::now() + expires_in,
    }
}

/// Store a participant holding `credential`.
#[allow(dead_code)]
pub async fn add_participant(
    store: &MemoryStore,
    user_id: &str,
    credential: Option<&Credential>,
) -> UserProfile {
    let mut profile = UserProfile::new(user_id, Role::Participant);
    profile.set_credential(credential);
    store.upsert_profile(&profile).await.unwrap();
    profile
}

/// Shared state over the given transport and a fresh in-memory store.
#[allow(dead_code)]
pub fn test_state(transport: Arc<MockTransport>) -> (Arc<AppState>, MemoryStore) {
    let store = MemoryStore::new();
    let state = AppState::new(Config::test_default(), transport, Arc::new(store.clone()));
    (Arc::new(state), store)
}

/// Create a test app over a scripted Fitbit and an in-memory store.
#[allow(dead_code)]
pub fn create_test_app(transport: Arc<MockTransport>) -> (axum::Router, Arc<AppState>, MemoryStore) {
    let (state, store) = test_state(transport);
    (create_router(state.clone()), state, store)
}

/// Transport that fails the test if anything is sent.
#[allow(dead_code)]
pub fn no_fitbit() -> Arc<MockTransport> {
    MockTransport::new(|request| panic!("unexpected Fitbit request: {}", request.url))
}
