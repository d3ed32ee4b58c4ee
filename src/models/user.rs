//! Participant profile and Fitbit credential models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Portal role. Only participants own a Fitbit connection worth syncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Participant,
    Researcher,
}

/// User profile stored in the `user_profiles` collection.
///
/// The three `fitbit_*`/`token_*` fields together form the participant's
/// credential. They are written only by the token refresher and cleared
/// together on disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Portal user ID (also used as document ID)
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub fitbit_access_token: Option<String>,
    #[serde(default)]
    pub fitbit_refresh_token: Option<String>,
    /// When the access token expires
    #[serde(default)]
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Last time at least one day synced successfully
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// New profile without a Fitbit connection.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            fitbit_access_token: None,
            fitbit_refresh_token: None,
            token_expires_at: None,
            last_sync_at: None,
        }
    }

    pub fn is_participant(&self) -> bool {
        self.role == Role::Participant
    }

    /// The stored credential, if all three fields are present.
    pub fn credential(&self) -> Option<Credential> {
        Some(Credential {
            access_token: self.fitbit_access_token.clone()?,
            refresh_token: self.fitbit_refresh_token.clone()?,
            expires_at: self.token_expires_at?,
        })
    }

    /// Overwrite (or clear) all three credential fields at once.
    pub fn set_credential(&mut self, credential: Option<&Credential>) {
        self.fitbit_access_token = credential.map(|c| c.access_token.clone());
        self.fitbit_refresh_token = credential.map(|c| c.refresh_token.clone());
        self.token_expires_at = credential.map(|c| c.expires_at);
    }
}

/// A participant's Fitbit access/refresh token pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
