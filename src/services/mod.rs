// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod devices;
pub mod fitbit;
pub mod normalize;
pub mod subscriptions;
pub mod sync;
pub mod transport;

pub use devices::{DeviceSyncResult, DeviceSyncer};
pub use fitbit::{FitbitClient, TokenRefresher};
pub use subscriptions::SubscriptionService;
pub use sync::SyncEngine;
pub use transport::{HttpTransport, ProviderRequest, ProviderResponse};
