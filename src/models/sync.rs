//! Sync outcome aggregates and queued sync requests.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of syncing one participant for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub date: NaiveDate,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn succeeded(date: NaiveDate) -> Self {
        Self {
            date,
            success: true,
            error: None,
        }
    }

    pub fn failed(date: NaiveDate, error: impl Into<String>) -> Self {
        Self {
            date,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// All date outcomes for one participant in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSyncResult {
    pub user_id: String,
    pub results: Vec<SyncOutcome>,
    /// Set when the participant was aborted before any per-date work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParticipantSyncResult {
    /// A participant skipped before any date was attempted.
    pub fn aborted(user_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            results: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Number of dates that synced successfully.
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Number of dates that failed.
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// A participant counts as synced if at least one date succeeded.
    pub fn any_succeeded(&self) -> bool {
        self.results.iter().any(|r| r.success)
    }
}

/// Result of one batch over a set of participants.
///
/// `success` only says the orchestration ran to completion; individual
/// failures are visible in `results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSyncResult {
    pub success: bool,
    pub results: Vec<ParticipantSyncResult>,
}

impl BatchSyncResult {
    /// Total failed dates plus aborted participants.
    pub fn failure_count(&self) -> usize {
        self.results
            .iter()
            .map(|p| p.failed() + usize::from(p.error.is_some()))
            .sum()
    }
}

/// Sync request queued by the webhook for later processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub user_id: String,
    pub date: NaiveDate,
    pub collection_type: String,
    /// Always "pending" when enqueued
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl SyncRequest {
    pub fn pending(user_id: impl Into<String>, date: NaiveDate, collection_type: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            collection_type: collection_type.into(),
            status: "pending".to_string(),
            created_at: Utc::now(),
        }
    }

    /// Document ID: one pending request per (user, date, collection).
    pub fn document_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.user_id,
            self.date.format("%Y-%m-%d"),
            urlencoding::encode(&self.collection_type)
        )
    }
}
