// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Configuration loaded from environment variables (and `.env` when present).

use chrono_tz::Tz;
use std::env;

/// Hosted proxy that relays calendar feeds which do not allow direct fetches.
pub const DEFAULT_PROXY_URL: &str =
    "https://asia-east2-how-behind.cloudfunctions.net/timetable-proxy";

/// Collection holding one profile document per identity.
pub const DEFAULT_PROFILE_COLLECTION: &str = "user";

/// Runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Proxy endpoint for feed fetches. `None` fetches feeds directly.
    pub proxy_url: Option<String>,
    /// Timezone in which session dates and times-of-day are expressed
    pub timezone: Tz,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Firestore collection for stored profiles
    pub profile_collection: String,
    /// Web API key used for anonymous sign-up (optional)
    pub firebase_api_key: Option<String>,
}

impl Config {
    /// Fixed configuration for tests.
    pub fn test_default() -> Self {
        Self {
            proxy_url: None,
            timezone: Tz::UTC,
            gcp_project_id: "test-project".to_string(),
            profile_collection: DEFAULT_PROFILE_COLLECTION.to_string(),
            firebase_api_key: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let proxy_url = match env::var("TIMETABLE_PROXY_URL") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v.trim().to_string()),
            Err(_) => Some(DEFAULT_PROXY_URL.to_string()),
        };

        let timezone = match env::var("TIMETABLE_TZ") {
            Ok(name) => parse_timezone(&name)?,
            Err(_) => Tz::UTC,
        };

        Ok(Self {
            proxy_url,
            timezone,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            profile_collection: env::var("PROFILE_COLLECTION")
                .unwrap_or_else(|_| DEFAULT_PROFILE_COLLECTION.to_string()),
            firebase_api_key: env::var("FIREBASE_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

/// Parse an IANA timezone name such as `Australia/Brisbane`.
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::Invalid("TIMETABLE_TZ", name.to_string()))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("TIMETABLE_TZ", "Australia/Brisbane");
        env::set_var("TIMETABLE_PROXY_URL", "");
        env::set_var("FIREBASE_API_KEY", "  key-123 ");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.timezone, chrono_tz::Australia::Brisbane);
        assert_eq!(config.proxy_url, None);
        assert_eq!(config.firebase_api_key.as_deref(), Some("key-123"));
        assert_eq!(config.profile_collection, "user");
    }

    #[test]
    fn test_parse_timezone_rejects_unknown() {
        let err = parse_timezone("Mars/Olympus_Mons").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("TIMETABLE_TZ", _)));
    }
}
