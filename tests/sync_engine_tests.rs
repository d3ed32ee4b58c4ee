// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Batch orchestration and per-day sync tests against a scripted Fitbit.

mod common;

use chrono::{Duration, NaiveDate};
use common::{
    add_participant, credential, heart_payload, json_response, sleep_payload, test_state,
    token_response, MockTransport,
};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wearable_sync::config::{Config, SyncConfig};
use wearable_sync::db::{MemoryStore, Store};
use wearable_sync::services::{FitbitClient, SyncEngine};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

/// Engine over a fresh store with the given pacing between dates.
fn paced_engine(transport: Arc<MockTransport>, pacing: std::time::Duration) -> (SyncEngine, MemoryStore) {
    let config = Config::test_default();
    let store = MemoryStore::new();
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    let client = FitbitClient::new(&config.fitbit, transport, shared.clone());
    let sync = SyncConfig {
        window_days: 7,
        pacing,
    };
    (SyncEngine::new(client, shared, sync), store)
}

/// Fitbit with heart rate and sleep for `days` only; every other date 404s.
fn fitbit_with_data_on(days: &'static [&'static str]) -> Arc<MockTransport> {
    MockTransport::new(move |request| {
        let has_data = days.iter().any(|d| request.url.contains(d));
        if !has_data {
            return json_response(StatusCode::NOT_FOUND, json!({"errors": []}));
        }
        if request.url.contains("/activities/heart/") {
            json_response(StatusCode::OK, heart_payload(60))
        } else {
            json_response(StatusCode::OK, sleep_payload(25_200_000))
        }
    })
}

#[tokio::test]
async fn test_batch_end_to_end_partial_success() {
    let transport = fitbit_with_data_on(&["2024-01-03", "2024-01-06"]);
    let (state, store) = test_state(transport.clone());
    let cred = credential("current", Duration::hours(8));
    let profile = add_participant(&store, "p1", Some(&cred)).await;

    let batch = state
        .sync_engine
        .sync_all_ending(&[profile], day(7))
        .await;

    assert!(batch.success);
    assert_eq!(batch.results.len(), 1);

    let participant = &batch.results[0];
    assert_eq!(participant.user_id, "p1");
    assert_eq!(participant.results.len(), 7);
    assert_eq!(participant.succeeded(), 2);

    // Oldest first, ending at the requested date.
    let dates: Vec<_> = participant.results.iter().map(|r| r.date).collect();
    assert_eq!(dates, (1..=7).map(day).collect::<Vec<_>>());
    assert!(participant.results[2].success);
    assert!(participant.results[5].success);
    assert!(participant.results[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("heart rate")));

    assert_eq!(store.metric_count(), 2);
    let stored = store.get_profile("p1").await.unwrap().unwrap();
    assert!(stored.last_sync_at.is_some());
}

#[tokio::test]
async fn test_days_without_data_store_empty_record() {
    let transport = MockTransport::new(|request| {
        if request.url.contains("/activities/heart/") {
            json_response(StatusCode::OK, json!({"activities-heart": []}))
        } else {
            json_response(StatusCode::OK, json!({"sleep": [], "summary": {}}))
        }
    });
    let (state, store) = test_state(transport);
    let mut cred = credential("current", Duration::hours(8));
    add_participant(&store, "p1", Some(&cred)).await;

    assert!(state.sync_engine.sync_day("p1", day(2), &mut cred).await);

    let records = store.get_daily_metrics("p1", day(2), day(2)).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].heart_rate, None);
    assert_eq!(records[0].sleep, None);
    assert_eq!(records[0].hrv, None);
}

#[tokio::test]
async fn test_resync_overwrites_record() {
    let calls = AtomicUsize::new(0);
    let transport = MockTransport::new(move |request| {
        if request.url.contains("/activities/heart/") {
            let resting = if calls.fetch_add(1, Ordering::SeqCst) == 0 { 60 } else { 55 };
            json_response(StatusCode::OK, heart_payload(resting))
        } else {
            json_response(StatusCode::OK, sleep_payload(25_200_000))
        }
    });
    let (state, store) = test_state(transport);
    let mut cred = credential("current", Duration::hours(8));
    add_participant(&store, "p1", Some(&cred)).await;

    assert!(state.sync_engine.sync_day("p1", day(4), &mut cred).await);
    assert!(state.sync_engine.sync_day("p1", day(4), &mut cred).await);

    assert_eq!(store.metric_count(), 1);
    let records = store.get_daily_metrics("p1", day(4), day(4)).await.unwrap();
    let heart_rate = records[0].heart_rate.as_ref().unwrap();
    assert_eq!(heart_rate.resting_heart_rate, Some(55));
    assert_eq!(heart_rate.average, Some(87));
}

#[tokio::test]
async fn test_heart_rate_failure_skips_sleep_request() {
    let transport = MockTransport::new(|request| {
        if request.url.contains("/activities/heart/") {
            json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({}))
        } else {
            json_response(StatusCode::OK, sleep_payload(1))
        }
    });
    let (state, store) = test_state(transport.clone());
    let mut cred = credential("current", Duration::hours(8));
    add_participant(&store, "p1", Some(&cred)).await;

    assert!(!state.sync_engine.sync_day("p1", day(1), &mut cred).await);
    assert_eq!(transport.requests_to("/sleep/").len(), 0);
    assert_eq!(store.metric_count(), 0);
}

#[tokio::test]
async fn test_persistence_failure_fails_day() {
    let transport = fitbit_with_data_on(&["2024-01-01"]);
    let (state, store) = test_state(transport);
    let mut cred = credential("current", Duration::hours(8));
    add_participant(&store, "p1", Some(&cred)).await;
    store.set_fail_metric_writes(true);

    assert!(!state.sync_engine.sync_day("p1", day(1), &mut cred).await);
}

#[tokio::test]
async fn test_rejected_retry_records_failed_dates() {
    let issued = AtomicUsize::new(0);
    let transport = MockTransport::new(move |request| {
        if request.url.ends_with("/oauth2/token") {
            token_response(&issued)
        } else {
            json_response(StatusCode::UNAUTHORIZED, json!({}))
        }
    });
    let (state, store) = test_state(transport.clone());
    let cred = credential("revoked", Duration::hours(8));
    let profile = add_participant(&store, "p1", Some(&cred)).await;

    let batch = state
        .sync_engine
        .sync_all_ending(&[profile], day(7))
        .await;

    let participant = &batch.results[0];
    assert_eq!(participant.results.len(), 7);
    assert_eq!(participant.succeeded(), 0);
    assert!(participant.error.is_none());
    // One refresh per date: the retry after each refresh is rejected again.
    assert_eq!(transport.token_requests(), 7);

    let stored = store.get_profile("p1").await.unwrap().unwrap();
    assert!(stored.last_sync_at.is_none());
}

#[tokio::test]
async fn test_refreshed_credential_carries_across_dates() {
    let issued = AtomicUsize::new(0);
    let transport = MockTransport::new(move |request| {
        if request.url.ends_with("/oauth2/token") {
            return token_response(&issued);
        }
        if request.url.contains("/activities/heart/") {
            json_response(StatusCode::OK, heart_payload(60))
        } else {
            json_response(StatusCode::OK, sleep_payload(25_200_000))
        }
    });
    let (state, store) = test_state(transport.clone());
    let cred = credential("old", Duration::seconds(10));
    let profile = add_participant(&store, "p1", Some(&cred)).await;

    let batch = state
        .sync_engine
        .sync_all_ending(&[profile], day(7))
        .await;

    assert_eq!(batch.results[0].succeeded(), 7);
    assert_eq!(transport.token_requests(), 1);
    for request in transport.requests_to("/1/user/-/") {
        assert_eq!(request.header_value("Authorization"), Some("Bearer access_1"));
    }
}

#[tokio::test]
async fn test_missing_credential_aborts_only_that_participant() {
    let transport = fitbit_with_data_on(&["2024-01-07"]);
    let (state, store) = test_state(transport.clone());
    let disconnected = add_participant(&store, "p0", None).await;
    let cred = credential("current", Duration::hours(8));
    let connected = add_participant(&store, "p1", Some(&cred)).await;

    let batch = state
        .sync_engine
        .sync_all_ending(&[disconnected, connected], day(7))
        .await;

    assert!(batch.success);
    assert_eq!(batch.results.len(), 2);

    let aborted = &batch.results[0];
    assert!(aborted.results.is_empty());
    assert!(aborted.error.is_some());

    assert_eq!(batch.results[1].succeeded(), 1);
    assert_eq!(batch.failure_count(), 1 + 6);

    let stored = store.get_profile("p0").await.unwrap().unwrap();
    assert!(stored.last_sync_at.is_none());
}

#[tokio::test]
async fn test_sync_connected_uses_store_participants() {
    let transport = fitbit_with_data_on(&[]);
    let (state, store) = test_state(transport.clone());
    let cred = credential("current", Duration::hours(8));
    add_participant(&store, "p1", Some(&cred)).await;
    add_participant(&store, "p2", None).await;

    let batch = state.sync_engine.sync_connected().await.unwrap();

    assert_eq!(batch.results.len(), 1);
    assert_eq!(batch.results[0].user_id, "p1");
    assert_eq!(batch.results[0].results.len(), 7);
}

#[tokio::test]
async fn test_failed_refresh_exhausts_credential_for_cycle() {
    let transport = MockTransport::new(|request| {
        if request.url.ends_with("/oauth2/token") {
            json_response(StatusCode::BAD_REQUEST, json!({"errors": [{"errorType": "invalid_grant"}]}))
        } else {
            json_response(StatusCode::OK, heart_payload(60))
        }
    });
    let (state, store) = test_state(transport.clone());
    let cred = credential("expiring", Duration::seconds(5));
    let profile = add_participant(&store, "p1", Some(&cred)).await;

    let batch = state
        .sync_engine
        .sync_all_ending(&[profile], day(7))
        .await;

    let participant = &batch.results[0];
    assert_eq!(participant.results.len(), 7);
    assert_eq!(participant.succeeded(), 0);
    for outcome in &participant.results {
        assert!(outcome
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Token refresh failed")));
    }

    // One refresh attempt, and no data requests once it failed.
    assert_eq!(transport.token_requests(), 1);
    assert_eq!(transport.requests().len(), 1);

    let stored = store.get_profile("p1").await.unwrap().unwrap();
    assert_eq!(stored.fitbit_access_token.as_deref(), Some("expiring"));
    assert!(stored.last_sync_at.is_none());
}

#[tokio::test]
async fn test_failed_refresh_does_not_affect_next_participant() {
    let transport = MockTransport::new(|request| {
        if request.url.ends_with("/oauth2/token") {
            json_response(StatusCode::BAD_REQUEST, json!({}))
        } else if request.url.contains("/activities/heart/") {
            json_response(StatusCode::OK, heart_payload(60))
        } else {
            json_response(StatusCode::OK, sleep_payload(25_200_000))
        }
    });
    let (state, store) = test_state(transport.clone());
    let revoked = add_participant(&store, "p1", Some(&credential("old", Duration::seconds(5)))).await;
    let healthy = add_participant(&store, "p2", Some(&credential("fresh", Duration::hours(8)))).await;

    let batch = state
        .sync_engine
        .sync_all_ending(&[revoked, healthy], day(7))
        .await;

    assert_eq!(batch.results[0].succeeded(), 0);
    assert_eq!(batch.results[1].succeeded(), 7);
    assert_eq!(transport.token_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pacing_between_dates() {
    let transport = fitbit_with_data_on(&["2024-01-07"]);
    let (engine, store) = paced_engine(transport, std::time::Duration::from_millis(250));
    let profile = add_participant(&store, "p1", Some(&credential("current", Duration::hours(8)))).await;

    let start = tokio::time::Instant::now();
    let batch = engine.sync_all_ending(&[profile], day(7)).await;
    let elapsed = start.elapsed();

    assert_eq!(batch.results[0].results.len(), 7);
    // Six gaps between seven dates; no pause after the last one.
    assert!(elapsed >= std::time::Duration::from_millis(6 * 250), "{:?}", elapsed);
    assert!(elapsed < std::time::Duration::from_millis(7 * 250), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_pacing_continues_across_participants() {
    let transport = fitbit_with_data_on(&["2024-01-07"]);
    let (engine, store) = paced_engine(transport, std::time::Duration::from_millis(250));
    let p1 = add_participant(&store, "p1", Some(&credential("a1", Duration::hours(8)))).await;
    let p2 = add_participant(&store, "p2", Some(&credential("a2", Duration::hours(8)))).await;

    let start = tokio::time::Instant::now();
    engine.sync_all_ending(&[p1, p2], day(7)).await;
    let elapsed = start.elapsed();

    // Every date after the batch's first is preceded by a pause.
    assert!(elapsed >= std::time::Duration::from_millis(13 * 250), "{:?}", elapsed);
    assert!(elapsed < std::time::Duration::from_millis(14 * 250), "{:?}", elapsed);
}
