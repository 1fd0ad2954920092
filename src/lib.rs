// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Timetable-Sync: class timetables from calendar feeds plus per-user overrides
//!
//! This crate fetches an ICS timetable feed, turns it into normalized class
//! sessions, and keeps a live-bound profile document (overrides, breaks) in
//! sync with the current identity.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{DocumentStore, IdentityProvider};
use models::{Profile, Session};
use services::{
    merge_schedule, FeedFetcher, FeedState, HttpFeedFetcher, OverrideStore, StoreState,
    TimetableFeed,
};
use std::sync::Arc;

/// Shared application state.
pub struct ServiceContext<F = HttpFeedFetcher> {
    pub config: Config,
    pub feed: TimetableFeed<F>,
    pub profile: OverrideStore<Profile>,
}

impl ServiceContext<HttpFeedFetcher> {
    /// Build the context with the HTTP feed fetcher from `config`.
    pub fn from_config(
        config: Config,
        identity: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let fetcher = HttpFeedFetcher::new(config.proxy_url.clone());
        Self::new(config, fetcher, identity, documents)
    }
}

impl<F: FeedFetcher> ServiceContext<F> {
    /// Must be called within a Tokio runtime.
    pub fn new(
        config: Config,
        fetcher: F,
        identity: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let feed = TimetableFeed::new(fetcher, config.timezone);
        let profile = OverrideStore::new(identity, documents);
        Self {
            config,
            feed,
            profile,
        }
    }

    /// Point the feed at the calendar URL stored in the profile.
    pub fn follow_profile_feed(&self) {
        let url = self.profile.data().and_then(|p| p.ical);
        self.feed.set_source(url);
    }

    /// Wait for both the feed and the profile to finish loading.
    pub async fn settled(&self) -> (FeedState, StoreState<Profile>) {
        futures_util::future::join(self.feed.settled(), self.profile.settled()).await
    }

    /// The feed schedule with the profile's overrides and breaks applied.
    pub fn schedule(&self) -> Vec<Session> {
        let feed = self.feed.state().data.unwrap_or_default();
        let profile = self.profile.data();
        merge_schedule(&feed, profile.as_ref(), &self.config.timezone)
    }
}
