// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reactive feed tests: state transitions, caching and superseded loads.

use chrono_tz::Australia::Sydney;
use std::time::Duration;
use timetable_sync::models::Time;
use timetable_sync::services::{TimetableFeed, MAX_CACHED_FEEDS, TEST_FEED};

mod common;
use common::{fixture, wait_until, FakeFetcher};

const FEED_URL: &str = "https://timetable.example/cal/abc.ics";
const OTHER_URL: &str = "https://timetable.example/cal/xyz.ics";

fn feed_with(fetcher: &FakeFetcher) -> TimetableFeed<FakeFetcher> {
    TimetableFeed::new(fetcher.clone(), Sydney)
}

#[tokio::test]
async fn test_no_source_is_empty_and_idle() {
    let feed = feed_with(&FakeFetcher::new());
    feed.set_source(None);

    let state = feed.state();
    assert!(state.data.is_none());
    assert!(!state.loading);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_blank_source_counts_as_none() {
    let fetcher = FakeFetcher::new();
    let feed = feed_with(&fetcher);
    feed.set_source(Some("   ".to_string()));

    assert!(feed.state().data.is_none());
    assert!(!feed.state().loading);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_test_sentinel_is_synthetic_and_never_fetched() {
    let fetcher = FakeFetcher::new();
    let feed = feed_with(&fetcher);
    feed.set_source(Some(TEST_FEED.to_string()));

    let state = feed.state();
    assert!(!state.loading);
    let sessions = state.data.expect("Synthetic feed should be ready immediately");
    assert_eq!(sessions.len(), 2 * 1439);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_url_loads_then_publishes_sorted_sessions() {
    let fetcher = FakeFetcher::new();
    fetcher.serve(FEED_URL, fixture("timetable.ics"));
    let feed = feed_with(&fetcher);

    let gate = fetcher.hold(FEED_URL);
    feed.set_source(Some(FEED_URL.to_string()));
    assert!(feed.state().loading, "Should be loading while the fetch is pending");
    assert!(feed.state().data.is_none());

    gate.notify_one();
    let state = feed.settled().await;
    let sessions = state.data.expect("Feed should load");

    let summary: Vec<(&str, &str, Time, u32)> = sessions
        .iter()
        .map(|s| (s.course.as_str(), s.start.as_str(), s.time, s.duration))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("MATH1131", "2024-03-04", Time::new(9, 0), 60),
            ("COMP1511", "2024-03-04", Time::new(9, 0), 120),
            ("PHYS1121", "2024-03-05", Time::new(14, 0), 170),
            ("COMP1511", "2024-03-06", Time::new(11, 0), 120),
        ]
    );
    assert!(sessions.iter().all(|s| s.frequency == 1 && s.has_current_id()));
}

#[tokio::test]
async fn test_fetch_failure_collapses_to_no_data() {
    let fetcher = FakeFetcher::new();
    fetcher.fail(FEED_URL, "HTTP 502 Bad Gateway");
    let feed = feed_with(&fetcher);

    feed.set_source(Some(FEED_URL.to_string()));
    let state = feed.settled().await;

    assert!(state.data.is_none());
    assert!(!state.loading);
    let error = state.error.expect("Failure reason should be kept");
    assert!(error.contains("502"), "Unexpected error: {}", error);
}

#[tokio::test]
async fn test_unparseable_feed_collapses_to_no_data() {
    let fetcher = FakeFetcher::new();
    fetcher.serve(FEED_URL, "<html>Login required</html>");
    let feed = feed_with(&fetcher);

    feed.set_source(Some(FEED_URL.to_string()));
    let state = feed.settled().await;

    assert!(state.data.is_none());
    assert!(state.error.is_some());
}

#[tokio::test]
async fn test_same_url_is_served_from_cache() {
    let fetcher = FakeFetcher::new();
    fetcher.serve(FEED_URL, fixture("timetable.ics"));
    fetcher.serve(OTHER_URL, fixture("timetable.ics"));
    let feed = feed_with(&fetcher);

    feed.set_source(Some(FEED_URL.to_string()));
    let first = feed.settled().await.data.expect("First load");

    feed.set_source(Some(OTHER_URL.to_string()));
    feed.settled().await;

    feed.set_source(Some(FEED_URL.to_string()));
    let state = feed.state();
    assert!(!state.loading, "Cached source should be ready without loading");
    assert!(std::sync::Arc::ptr_eq(&first, &state.data.expect("Cached data")));
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_cache_evicts_oldest_feed_beyond_capacity() {
    let fetcher = FakeFetcher::new();
    let urls: Vec<String> = (0..=MAX_CACHED_FEEDS)
        .map(|i| format!("https://timetable.example/cal/{}.ics", i))
        .collect();
    for url in &urls {
        fetcher.serve(url, fixture("timetable.ics"));
    }
    let feed = feed_with(&fetcher);

    for url in &urls {
        feed.set_source(Some(url.clone()));
        feed.settled().await;
        // Distinct fetch times for the eviction order.
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(fetcher.calls(), MAX_CACHED_FEEDS + 1);

    // The most recent feeds are still cached.
    feed.set_source(Some(urls[MAX_CACHED_FEEDS - 1].clone()));
    assert!(!feed.state().loading);
    assert_eq!(fetcher.calls(), MAX_CACHED_FEEDS + 1);

    // The first one was evicted and is fetched again.
    feed.set_source(Some(urls[0].clone()));
    assert!(feed.state().loading);
    assert!(feed.settled().await.data.is_some());
    assert_eq!(fetcher.calls(), MAX_CACHED_FEEDS + 2);
}

#[tokio::test]
async fn test_setting_same_source_is_noop() {
    let fetcher = FakeFetcher::new();
    fetcher.serve(FEED_URL, fixture("timetable.ics"));
    let feed = feed_with(&fetcher);

    feed.set_source(Some(FEED_URL.to_string()));
    feed.settled().await;

    let mut rx = feed.subscribe();
    rx.borrow_and_update();
    feed.set_source(Some(FEED_URL.to_string()));
    assert!(!rx.has_changed().unwrap());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_superseded_fetch_is_discarded() {
    let fetcher = FakeFetcher::new();
    fetcher.serve(FEED_URL, fixture("timetable.ics"));
    let feed = feed_with(&fetcher);

    let slow = fetcher.hold(FEED_URL);
    feed.set_source(Some(FEED_URL.to_string()));
    feed.set_source(Some(TEST_FEED.to_string()));
    let synthetic = feed.state().data.expect("Synthetic feed");

    let mut rx = feed.subscribe();
    rx.borrow_and_update();

    slow.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!rx.has_changed().unwrap(), "Late result must not be published");
    let state = feed.state();
    assert!(std::sync::Arc::ptr_eq(&synthetic, &state.data.expect("Still synthetic")));
}

#[tokio::test]
async fn test_clearing_source_while_loading() {
    let fetcher = FakeFetcher::new();
    fetcher.serve(FEED_URL, fixture("timetable.ics"));
    let feed = feed_with(&fetcher);

    let gate = fetcher.hold(FEED_URL);
    feed.set_source(Some(FEED_URL.to_string()));
    feed.set_source(None);
    assert!(!feed.state().loading);

    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(feed.state().data.is_none());
}

#[tokio::test]
async fn test_refresh_refetches_current_url() {
    let fetcher = FakeFetcher::new();
    fetcher.serve(FEED_URL, fixture("timetable.ics"));
    let feed = feed_with(&fetcher);

    feed.set_source(Some(FEED_URL.to_string()));
    assert_eq!(feed.settled().await.data.map(|d| d.len()), Some(4));

    fetcher.serve(FEED_URL, "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n");
    feed.refresh();

    let mut rx = feed.subscribe();
    wait_until(&mut rx, |s| s.data.as_ref().is_some_and(|d| d.is_empty())).await;
    assert_eq!(fetcher.calls(), 2);
}
