// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reactive timetable feed.
//!
//! Holds the current feed source (none, the synthetic test feed, or a URL)
//! and publishes a [`FeedState`] snapshot whenever it changes:
//! - no source: no data, not loading
//! - test feed: synthetic schedule, not loading
//! - URL: loading, then either the sorted sessions or no data
//!
//! Fetch, parse and mapping failures never reach the caller. They are logged
//! and kept in [`FeedState::error`]. A fetch that finishes after the source
//! has changed is discarded.

use crate::error::Result;
use crate::models::Session;
use crate::services::fetch::FeedFetcher;
use crate::services::ics::sessions_from_ics;
use crate::services::synthetic::{make_test_events, TEST_FEED};
use chrono::Utc;
use chrono_tz::Tz;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;

/// Number of feed URLs kept in the cache. The oldest fetch is evicted first.
pub const MAX_CACHED_FEEDS: usize = 8;

/// Snapshot of the feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    pub data: Option<Arc<Vec<Session>>>,
    pub loading: bool,
    /// Why the last load produced no data, if it failed
    pub error: Option<String>,
}

impl FeedState {
    fn ready(data: Arc<Vec<Session>>) -> Self {
        Self {
            data: Some(data),
            loading: false,
            error: None,
        }
    }

    fn empty() -> Self {
        Self::default()
    }

    fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

struct CachedFeed {
    sessions: Arc<Vec<Session>>,
    fetched_at: Instant,
}

/// Current source plus a generation counter bumped on every change.
#[derive(Default)]
struct SourceSlot {
    generation: u64,
    source: Option<String>,
}

struct FeedInner<F> {
    fetcher: F,
    timezone: Tz,
    cache: DashMap<String, CachedFeed>,
    slot: Mutex<SourceSlot>,
    state: watch::Sender<FeedState>,
}

/// Reactive, cached timetable data source.
///
/// Cloning yields another handle to the same feed. Loading a URL spawns a
/// task, so sources must be set from within a Tokio runtime.
pub struct TimetableFeed<F> {
    inner: Arc<FeedInner<F>>,
}

impl<F> Clone for TimetableFeed<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: FeedFetcher> TimetableFeed<F> {
    pub fn new(fetcher: F, timezone: Tz) -> Self {
        let (state, _) = watch::channel(FeedState::empty());
        Self {
            inner: Arc::new(FeedInner {
                fetcher,
                timezone,
                cache: DashMap::new(),
                slot: Mutex::new(SourceSlot::default()),
                state,
            }),
        }
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.inner.state.subscribe()
    }

    /// Current snapshot.
    pub fn state(&self) -> FeedState {
        self.inner.state.borrow().clone()
    }

    /// Wait until the current load (if any) settles.
    pub async fn settled(&self) -> FeedState {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(|s| !s.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// Change the feed source. Setting the current value again is a no-op.
    pub fn set_source(&self, source: Option<String>) {
        let source = source.filter(|s| !s.trim().is_empty());
        let generation = {
            let mut slot = self.lock_slot();
            if slot.source == source && slot.generation > 0 {
                return;
            }
            slot.generation += 1;
            slot.source = source.clone();
            slot.generation
        };
        self.load(generation, source);
    }

    /// Drop the cached copy of the current URL and fetch it again.
    pub fn refresh(&self) {
        let (generation, source) = {
            let mut slot = self.lock_slot();
            slot.generation += 1;
            (slot.generation, slot.source.clone())
        };
        if let Some(url) = &source {
            self.inner.cache.remove(url);
        }
        self.load(generation, source);
    }

    fn load(&self, generation: u64, source: Option<String>) {
        let url = match source {
            None => {
                self.publish(generation, FeedState::empty());
                return;
            }
            Some(s) if s == TEST_FEED => {
                let events = make_test_events(Utc::now(), &self.inner.timezone);
                tracing::debug!(count = events.len(), "Using synthetic timetable feed");
                self.publish(generation, FeedState::ready(Arc::new(events)));
                return;
            }
            Some(url) => url,
        };

        if let Some(cached) = self.inner.cache.get(&url).map(|c| c.sessions.clone()) {
            tracing::debug!(url = %url, count = cached.len(), "Serving cached timetable feed");
            self.publish(generation, FeedState::ready(cached));
            return;
        }

        self.publish(generation, FeedState::loading());

        let feed = self.clone();
        tokio::spawn(async move {
            let state = match feed.fetch_sessions(&url).await {
                Ok(sessions) => {
                    tracing::info!(url = %url, count = sessions.len(), "Loaded timetable feed");
                    let sessions = Arc::new(sessions);
                    feed.cache_insert(url.clone(), sessions.clone());
                    FeedState::ready(sessions)
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Failed to load timetable feed");
                    FeedState::failed(e.to_string())
                }
            };
            if !feed.publish(generation, state) {
                tracing::debug!(url = %url, "Discarding result for superseded feed source");
            }
        });
    }

    fn cache_insert(&self, url: String, sessions: Arc<Vec<Session>>) {
        let cache = &self.inner.cache;
        while cache.len() >= MAX_CACHED_FEEDS && !cache.contains_key(&url) {
            let oldest = cache
                .iter()
                .min_by_key(|entry| entry.fetched_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(oldest) => {
                    tracing::debug!(url = %oldest, "Evicting cached timetable feed");
                    cache.remove(&oldest);
                }
                None => break,
            }
        }
        cache.insert(
            url,
            CachedFeed {
                sessions,
                fetched_at: Instant::now(),
            },
        );
    }

    async fn fetch_sessions(&self, url: &str) -> Result<Vec<Session>> {
        let body = self.inner.fetcher.fetch(url).await?;
        sessions_from_ics(&body, &self.inner.timezone)
    }

    /// Publish `state` if `generation` is still current.
    fn publish(&self, generation: u64, state: FeedState) -> bool {
        let slot = self.lock_slot();
        if slot.generation != generation {
            return false;
        }
        self.inner.state.send_replace(state);
        true
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, SourceSlot> {
        // The slot holds plain data, so a poisoned lock is still usable.
        self.inner
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
