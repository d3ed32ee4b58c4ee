// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wearable-Sync API Server
//!
//! Keeps research participants' Fitbit connections alive and syncs their
//! daily health metrics and device metadata into the study store.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wearable_sync::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryStore, Store},
    services::HttpTransport,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Wearable-Sync API");

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // One pooled client for all Fitbit traffic
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let transport: Arc<dyn HttpTransport> = Arc::new(http);
    tracing::info!(
        timeout_secs = config.http_timeout.as_secs(),
        window_days = config.sync.window_days,
        pacing_ms = config.sync.pacing.as_millis() as u64,
        "Fitbit client initialized"
    );

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), transport, store));

    // Build router
    let app = wearable_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wearable_sync=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
