// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod profile;
pub mod session;
pub mod stored;

pub use profile::Profile;
pub use session::{compare_sessions, make_id, sort_sessions, Session, Time, ID_PREFIX};
pub use stored::{LegacySession, RemoteTimestamp, StoredInstant, StoredSession};
