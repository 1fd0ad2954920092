// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - ingestion pipeline, reactive sources and identity.

pub mod auth;
pub mod feed;
pub mod fetch;
pub mod ics;
pub mod normalize;
pub mod schedule;
pub mod store;
pub mod synthetic;

pub use auth::IdentityToolkitAuth;
pub use feed::{FeedState, TimetableFeed, MAX_CACHED_FEEDS};
pub use fetch::{FeedFetcher, HttpFeedFetcher};
pub use ics::{sessions_from_ics, CalendarEvent};
pub use normalize::{normalize, normalize_all};
pub use schedule::merge_schedule;
pub use store::{OverrideStore, StoreState, Update};
pub use synthetic::{make_test_events, TEST_FEED};
