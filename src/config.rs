//! Application configuration loaded from environment variables.
//!
//! The Fitbit OAuth settings and the sync tuning knobs are grouped into their
//! own structs so they can be handed to the services that need them at
//! construction time.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default trailing window (days, inclusive of today).
pub const DEFAULT_SYNC_WINDOW_DAYS: u32 = 7;
/// Default delay between successive date syncs.
pub const DEFAULT_SYNC_PACING_MS: u64 = 250;
/// Default outbound HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

const DEFAULT_FITBIT_API_BASE_URL: &str = "https://api.fitbit.com";
const DEFAULT_FITBIT_TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";

/// Fitbit OAuth client settings, passed to the token refresher.
#[derive(Debug, Clone)]
pub struct FitbitConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI registered with Fitbit (used for code exchange)
    pub redirect_uri: String,
    /// Base URL of the Web API, without trailing slash
    pub api_base_url: String,
    /// Full URL of the OAuth2 token endpoint
    pub token_url: String,
}

/// Batch orchestration tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of calendar days synced per participant, ending today.
    pub window_days: u32,
    /// Delay inserted between date iterations.
    pub pacing: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_SYNC_WINDOW_DAYS,
            pacing: Duration::from_millis(DEFAULT_SYNC_PACING_MS),
        }
    }
}

/// Which store implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub fitbit: FitbitConfig,
    pub sync: SyncConfig,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    pub store_backend: StoreBackend,
    /// Server port
    pub port: u16,
    pub http_timeout: Duration,

    // --- Secrets ---
    /// Code Fitbit echoes back when verifying the subscriber endpoint
    pub fitbit_verification_code: String,
    /// Bearer secret required on the sync routes
    pub sync_api_secret: String,
}

impl Config {
    /// Fixed configuration for tests.
    pub fn test_default() -> Self {
        Self {
            fitbit: FitbitConfig {
                client_id: "test_client_id".to_string(),
                client_secret: "test_secret".to_string(),
                redirect_uri: "http://localhost:5173/fitbit/callback".to_string(),
                api_base_url: "http://fitbit.test".to_string(),
                token_url: "http://fitbit.test/oauth2/token".to_string(),
            },
            sync: SyncConfig {
                window_days: DEFAULT_SYNC_WINDOW_DAYS,
                pacing: Duration::ZERO,
            },
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            store_backend: StoreBackend::Memory,
            port: 8080,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            fitbit_verification_code: "test_verification_code".to_string(),
            sync_api_secret: "test_sync_secret".to_string(),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("firestore") | Err(_) => StoreBackend::Firestore,
            Ok(_) => return Err(ConfigError::Invalid("STORE_BACKEND")),
        };

        Ok(Self {
            fitbit: FitbitConfig {
                client_id: env::var("FITBIT_CLIENT_ID")
                    .map_err(|_| ConfigError::Missing("FITBIT_CLIENT_ID"))?,
                client_secret: env::var("FITBIT_CLIENT_SECRET")
                    .map(|v| v.trim().to_string())
                    .map_err(|_| ConfigError::Missing("FITBIT_CLIENT_SECRET"))?,
                redirect_uri: env::var("FITBIT_REDIRECT_URI")
                    .unwrap_or_else(|_| "http://localhost:5173/fitbit/callback".to_string()),
                api_base_url: env::var("FITBIT_API_BASE_URL")
                    .map(|v| v.trim_end_matches('/').to_string())
                    .unwrap_or_else(|_| DEFAULT_FITBIT_API_BASE_URL.to_string()),
                token_url: env::var("FITBIT_TOKEN_URL")
                    .unwrap_or_else(|_| DEFAULT_FITBIT_TOKEN_URL.to_string()),
            },
            sync: SyncConfig {
                window_days: parse_or("SYNC_WINDOW_DAYS", DEFAULT_SYNC_WINDOW_DAYS)?,
                pacing: Duration::from_millis(parse_or("SYNC_PACING_MS", DEFAULT_SYNC_PACING_MS)?),
            },
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            store_backend,
            port: parse_or("PORT", 8080)?,
            http_timeout: Duration::from_secs(parse_or(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),

            fitbit_verification_code: env::var("FITBIT_VERIFICATION_CODE")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FITBIT_VERIFICATION_CODE"))?,
            sync_api_secret: env::var("SYNC_API_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SYNC_API_SECRET"))?,
        })
    }
}

/// Read an optional numeric variable, falling back to `default` when unset.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
