// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wearable-Sync: Fitbit health data collection for research studies
//!
//! This crate provides the backend that keeps participants' Fitbit tokens
//! fresh and pulls their daily heart rate, sleep and device data into the
//! shared store.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{DeviceSyncer, FitbitClient, HttpTransport, SubscriptionService, SyncEngine};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub fitbit: FitbitClient,
    pub sync_engine: SyncEngine,
    pub device_syncer: DeviceSyncer,
    pub subscriptions: SubscriptionService,
}

impl AppState {
    /// Wire up all services around one transport and one store.
    pub fn new(config: Config, transport: Arc<dyn HttpTransport>, store: Arc<dyn Store>) -> Self {
        let fitbit = FitbitClient::new(&config.fitbit, transport, store.clone());

        Self {
            sync_engine: SyncEngine::new(fitbit.clone(), store.clone(), config.sync.clone()),
            device_syncer: DeviceSyncer::new(fitbit.clone(), store.clone()),
            subscriptions: SubscriptionService::new(fitbit.clone()),
            fitbit,
            store,
            config,
        }
    }
}
