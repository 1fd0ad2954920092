// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session records as they come back from the document store.
//!
//! Overrides written by older clients may lack the derived instants and id,
//! or carry the instants as strings or as store timestamp objects. Both
//! shapes deserialize into [`StoredSession`] and go through the normalizer.

use crate::models::session::{Session, Time};
use crate::time_utils::DateEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored session in either the current or a legacy shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredSession {
    Current(Session),
    Legacy(LegacySession),
}

impl From<Session> for StoredSession {
    fn from(session: Session) -> Self {
        StoredSession::Current(session)
    }
}

/// Session record missing some derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub course: String,
    pub activity: String,
    #[serde(default)]
    pub day: u8,
    pub time: Time,
    pub duration: u32,
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    pub start: DateEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<StoredInstant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<StoredInstant>,
}

fn default_frequency() -> u32 {
    1
}

/// An instant in one of the representations found in stored documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredInstant {
    /// Document-store timestamp object
    Timestamp(RemoteTimestamp),
    /// RFC3339 string with an offset
    Native(DateTime<Utc>),
    /// Any other serialized form
    Text(String),
}

/// Seconds/nanoseconds timestamp as emitted by the document store.
///
/// Exports use underscore-prefixed field names, hence the aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTimestamp {
    #[serde(alias = "_seconds")]
    pub seconds: i64,
    #[serde(default, alias = "_nanoseconds")]
    pub nanoseconds: u32,
}

impl RemoteTimestamp {
    pub fn to_date_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanoseconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_current_shape_deserializes_as_current() {
        let value = json!({
            "id": "v4|COMP1511|Lecture|2024-03-04T09:00:00.000Z",
            "course": "COMP1511",
            "activity": "Lecture",
            "day": 1,
            "time": {"hour": 9, "minute": 0},
            "duration": 60,
            "frequency": 1,
            "start": "2024-03-04",
            "startDate": "2024-03-04T09:00:00Z",
            "endDate": "2024-03-04T10:00:00Z"
        });

        let stored: StoredSession = serde_json::from_value(value).unwrap();
        assert!(matches!(stored, StoredSession::Current(_)));
    }

    #[test]
    fn test_missing_dates_deserialize_as_legacy() {
        let value = json!({
            "id": "old-format",
            "course": "COMP1511",
            "activity": "Lecture",
            "day": 1,
            "time": {"hour": 9, "minute": 0},
            "duration": 60,
            "frequency": 1,
            "start": "2024-03-04"
        });

        let stored: StoredSession = serde_json::from_value(value).unwrap();
        match stored {
            StoredSession::Legacy(legacy) => {
                assert_eq!(legacy.id.as_deref(), Some("old-format"));
                assert!(legacy.start_date.is_none());
                assert!(legacy.end_date.is_none());
            }
            other => panic!("Expected legacy shape, got {:?}", other),
        }
    }

    #[test]
    fn test_stored_instant_variants() {
        let ts: StoredInstant =
            serde_json::from_value(json!({"_seconds": 1709542800, "_nanoseconds": 0})).unwrap();
        assert!(matches!(ts, StoredInstant::Timestamp(_)));

        let native: StoredInstant = serde_json::from_value(json!("2024-03-04T09:00:00Z")).unwrap();
        assert!(matches!(native, StoredInstant::Native(_)));

        let text: StoredInstant = serde_json::from_value(json!("2024-03-04T09:00:00")).unwrap();
        assert_eq!(text, StoredInstant::Text("2024-03-04T09:00:00".to_string()));
    }

    #[test]
    fn test_remote_timestamp_conversion() {
        let ts = RemoteTimestamp {
            seconds: 1709542800,
            nanoseconds: 500_000_000,
        };
        let dt = ts.to_date_time().unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-04T09:00:00.500+00:00");
    }
}
