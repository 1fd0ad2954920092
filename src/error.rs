// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types shared by the ingestion pipeline and the override store.

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum TimetableError {
    /// Malformed date-entry, timestamp or calendar feed text.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Feed fetch failed (transport error or non-success status).
    #[error("Network error: {0}")]
    Network(String),

    /// A calendar event lacked the structure a session needs.
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Document store error: {0}")]
    Store(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TimetableError {
    /// Whether this error is one the ingestion pipeline collapses to "no data".
    pub fn is_feed_error(&self) -> bool {
        matches!(
            self,
            TimetableError::Parse(_) | TimetableError::Network(_) | TimetableError::Mapping(_)
        )
    }
}

impl From<serde_json::Error> for TimetableError {
    fn from(err: serde_json::Error) -> Self {
        TimetableError::Store(format!("Serialization failed: {}", err))
    }
}

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, TimetableError>;
