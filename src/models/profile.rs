// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-identity profile document.

use crate::models::session::Session;
use crate::models::stored::StoredSession;
use crate::services::normalize::normalize_all;
use crate::time_utils::{format_utc_rfc3339, DateEntry};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Profile stored in the document store, one per identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Calendar feed URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ical: Option<String>,
    /// Dates with no classes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaks: Option<Vec<DateEntry>>,
    /// Sessions the user is behind on, possibly in a legacy shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behind: Option<Vec<StoredSession>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Identities whose profiles were merged into this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_from: Option<Vec<String>>,
}

impl Profile {
    /// The override list, normalized to the current session shape.
    pub fn behind_sessions(&self, tz: &Tz) -> Vec<Session> {
        self.behind
            .as_ref()
            .map(|behind| normalize_all(behind.iter().cloned(), tz))
            .unwrap_or_default()
    }

    /// Replace the override list.
    pub fn set_behind(&mut self, sessions: impl IntoIterator<Item = Session>) {
        self.behind = Some(sessions.into_iter().map(StoredSession::from).collect());
    }

    /// Whether `date` is marked as a break.
    pub fn is_break(&self, date: &str) -> bool {
        self.breaks
            .as_ref()
            .is_some_and(|breaks| breaks.iter().any(|b| b == date))
    }

    /// Stamp `last_updated` with `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(format_utc_rfc3339(now));
    }
}
