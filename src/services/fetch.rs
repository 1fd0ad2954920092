// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar feed fetching.
//!
//! Feeds are requested through a proxy (`<proxy>?url=<encoded feed URL>`)
//! because many timetable hosts reject cross-origin requests. Without a
//! proxy the feed URL is fetched directly.

use crate::error::{Result, TimetableError};
use async_trait::async_trait;

/// Source of raw ICS text for a feed URL.
#[async_trait]
pub trait FeedFetcher: Send + Sync + 'static {
    async fn fetch(&self, feed_url: &str) -> Result<String>;
}

/// HTTP fetcher backed by reqwest.
#[derive(Clone)]
pub struct HttpFeedFetcher {
    http: reqwest::Client,
    proxy_url: Option<String>,
}

impl HttpFeedFetcher {
    pub fn new(proxy_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            proxy_url,
        }
    }

    /// The URL actually requested for `feed_url`.
    pub fn request_url(&self, feed_url: &str) -> String {
        match &self.proxy_url {
            Some(proxy) => format!("{}?url={}", proxy, urlencoding::encode(feed_url)),
            None => match feed_url.strip_prefix("webcal://") {
                Some(rest) => format!("https://{}", rest),
                None => feed_url.to_string(),
            },
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, feed_url: &str) -> Result<String> {
        let url = self.request_url(feed_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TimetableError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TimetableError::Network(format!("HTTP {}: {}", status, body)));
        }

        response
            .text()
            .await
            .map_err(|e| TimetableError::Network(format!("Failed to read feed body: {}", e)))
    }
}
