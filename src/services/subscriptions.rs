// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit push-notification subscriptions.
//!
//! Each participant gets one subscription per collection, identified as
//! `{user_id}-{collection}`. Fitbit echoes that identifier in webhook
//! notifications, which is how the webhook finds the participant.

use crate::error::AppError;
use crate::models::Credential;
use crate::services::fitbit::{endpoints, FitbitClient};
use crate::services::transport::ProviderRequest;
use serde::Deserialize;

/// Collections every participant is subscribed to.
pub const SUBSCRIPTION_COLLECTIONS: &[&str] = &[
    "activities/heart",
    "sleep",
    "hrv",
    "spo2",
    "breathing_rate",
    "temperature/core",
    "ecg",
];

#[derive(Debug, Deserialize)]
struct SubscriptionList {
    #[serde(rename = "apiSubscriptions", default)]
    api_subscriptions: Vec<ExistingSubscription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExistingSubscription {
    #[serde(default)]
    collection_type: String,
}

/// Subscription identifier for a participant and collection.
pub fn subscription_id(user_id: &str, collection: &str) -> String {
    format!("{}-{}", user_id, collection)
}

/// Split a subscription identifier into `(user_id, collection)`.
///
/// Splits at the last `-`: user IDs (UUIDs) contain dashes, collection
/// names never do.
pub fn parse_subscription_id(subscription_id: &str) -> Option<(&str, &str)> {
    let (user_id, collection) = subscription_id.rsplit_once('-')?;
    if user_id.is_empty() || collection.is_empty() {
        return None;
    }
    Some((user_id, collection))
}

#[derive(Clone)]
pub struct SubscriptionService {
    client: FitbitClient,
}

impl SubscriptionService {
    pub fn new(client: FitbitClient) -> Self {
        Self { client }
    }

    /// Create any missing subscriptions for the participant.
    ///
    /// Returns the collections that were created. Stops at the first
    /// failure; subscriptions created before it are kept.
    pub async fn ensure_subscriptions(
        &self,
        user_id: &str,
        credential: &mut Credential,
    ) -> Result<Vec<String>, AppError> {
        let response = self
            .client
            .get(user_id, credential, endpoints::SUBSCRIPTIONS)
            .await?;
        if !response.is_success() {
            return Err(AppError::UpstreamFetch(format!(
                "Failed to list subscriptions: {}",
                response.status
            )));
        }

        let existing: SubscriptionList = response.json()?;
        let mut created = Vec::new();

        for &collection in SUBSCRIPTION_COLLECTIONS {
            if existing
                .api_subscriptions
                .iter()
                .any(|s| s.collection_type == collection)
            {
                continue;
            }

            let path = endpoints::create_subscription(
                collection,
                &subscription_id(user_id, collection),
            );
            let request = ProviderRequest::post(self.client.url(&path));
            let response = self.client.fetch(user_id, credential, request).await?;

            if !response.is_success() {
                return Err(AppError::UpstreamFetch(format!(
                    "Failed to create subscription for {}: {}",
                    collection, response.status
                )));
            }

            tracing::info!(user_id, collection, "Fitbit subscription created");
            created.push(collection.to_string());
        }

        Ok(created)
    }
}
