// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Synthetic feed for test/demo mode.

use crate::models::session::{sort_sessions, Session};
use crate::time_utils::resolve_local;
use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;

/// Feed source value that selects the synthetic schedule.
pub const TEST_FEED: &str = "__TEST__";

const INTERVAL_MINUTES: u32 = 1;
const WINDOW_MINUTES: u32 = 24 * 60;

/// Generate a day of one-minute session pairs starting at the top of the
/// hour containing `now`.
///
/// Produces `2 * (1440 - 1)` sessions, sorted.
pub fn make_test_events(now: DateTime<Utc>, tz: &Tz) -> Vec<Session> {
    let count = WINDOW_MINUTES.div_ceil(INTERVAL_MINUTES);

    let local_hour = now
        .with_timezone(tz)
        .naive_local()
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0));
    let mut start = match local_hour {
        Some(naive) => resolve_local(tz, naive).with_timezone(&Utc),
        None => now,
    };

    let mut events = Vec::with_capacity(2 * count as usize);
    for i in 1..count {
        events.push(Session::from_start(
            "TEST2000",
            format!("Test Activity {}", i),
            start,
            INTERVAL_MINUTES,
            tz,
        ));
        events.push(Session::from_start(
            "TEST2001",
            format!("Test Activity B{}", i),
            start,
            INTERVAL_MINUTES,
            tz,
        ));
        start += Duration::minutes(i64::from(INTERVAL_MINUTES));
    }

    sort_sessions(&mut events);
    events
}
