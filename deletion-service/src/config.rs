//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables. A `.env` file is
//! loaded first by the binary when present.

use std::env;
use std::str::FromStr;

use tracing::warn;

/// Public URL used for status links when `BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://data-deletion-callback.onrender.com";

/// Which document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local map; data is lost on restart
    Memory,
    /// Cloud Firestore over REST
    Firestore,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "firestore" => Ok(StoreBackend::Firestore),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Facebook app secret used to verify signed requests
    pub app_secret: Option<String>,

    /// Public base URL for status links
    pub base_url: String,

    /// Port for the web server to listen on
    pub port: u16,

    /// Document store backend
    pub store_backend: StoreBackend,

    /// Firestore project id
    pub firestore_project_id: Option<String>,

    /// Firestore database id
    pub firestore_database: String,

    /// OAuth bearer token for Firestore
    pub firestore_access_token: Option<String>,

    /// `host:port` of a Firestore emulator
    pub firestore_emulator_host: Option<String>,

    /// Path to a service account key file used to mint Firestore tokens
    pub google_application_credentials: Option<String>,

    /// Collection holding user records
    pub users_collection: String,

    /// Collection holding deletion audit records
    pub deletion_logs_collection: String,

    /// Store HTTP request timeout in milliseconds
    pub store_timeout_ms: u64,

    /// Maximum number of deletion jobs running at once
    pub deletion_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let firestore_project_id = non_empty("FIRESTORE_PROJECT_ID");
        let google_application_credentials = non_empty("GOOGLE_APPLICATION_CREDENTIALS");

        let default_backend = if firestore_project_id.is_some()
            || google_application_credentials.is_some()
        {
            StoreBackend::Firestore
        } else {
            StoreBackend::Memory
        };

        Config {
            app_secret: non_empty("APP_SECRET"),

            base_url: non_empty("BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),

            port: parse_or("PORT", 3000),

            store_backend: parse_or("STORE_BACKEND", default_backend),

            firestore_project_id,

            firestore_database: non_empty("FIRESTORE_DATABASE")
                .unwrap_or_else(|| "(default)".to_string()),

            firestore_access_token: non_empty("FIRESTORE_ACCESS_TOKEN"),

            firestore_emulator_host: non_empty("FIRESTORE_EMULATOR_HOST"),

            google_application_credentials,

            users_collection: non_empty("USERS_COLLECTION").unwrap_or_else(|| "users".to_string()),

            deletion_logs_collection: non_empty("DELETION_LOGS_COLLECTION")
                .unwrap_or_else(|| "deletion_logs".to_string()),

            store_timeout_ms: parse_or("STORE_TIMEOUT_MS", 10_000),

            deletion_concurrency: parse_or("DELETION_CONCURRENCY", 16),
        }
    }
}

// Hand-written so the secrets never reach a log line.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("port", &self.port)
            .field("store_backend", &self.store_backend)
            .field("firestore_project_id", &self.firestore_project_id)
            .field("firestore_database", &self.firestore_database)
            .field(
                "firestore_access_token",
                &self.firestore_access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("firestore_emulator_host", &self.firestore_emulator_host)
            .field(
                "google_application_credentials",
                &self.google_application_credentials,
            )
            .field("users_collection", &self.users_collection)
            .field("deletion_logs_collection", &self.deletion_logs_collection)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("deletion_concurrency", &self.deletion_concurrency)
            .finish()
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    let Some(raw) = non_empty(name) else {
        return default;
    };

    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
