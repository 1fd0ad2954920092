// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Composition of the feed schedule with a stored profile.

use crate::models::session::sort_sessions;
use crate::models::{Profile, Session};
use chrono_tz::Tz;
use std::collections::HashMap;

/// Merge feed sessions with the profile's overrides.
///
/// Sessions are keyed by id and a stored override replaces the feed copy of
/// the same occurrence. Sessions falling on a break date are dropped. The
/// result is in canonical order.
pub fn merge_schedule(feed: &[Session], profile: Option<&Profile>, tz: &Tz) -> Vec<Session> {
    let overrides = profile.map(|p| p.behind_sessions(tz)).unwrap_or_default();

    let mut by_id: HashMap<String, usize> = HashMap::with_capacity(feed.len() + overrides.len());
    let mut merged: Vec<Session> = Vec::with_capacity(feed.len() + overrides.len());

    for session in feed.iter().cloned().chain(overrides) {
        match by_id.get(&session.id) {
            Some(&index) => merged[index] = session,
            None => {
                by_id.insert(session.id.clone(), merged.len());
                merged.push(session);
            }
        }
    }

    if let Some(profile) = profile {
        let before = merged.len();
        merged.retain(|s| !profile.is_break(&s.start));
        let skipped = before - merged.len();
        if skipped > 0 {
            tracing::debug!(skipped, "Dropped sessions on break dates");
        }
    }

    sort_sessions(&mut merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn session(course: &str, d: u32, h: u32, duration: u32) -> Session {
        let start = Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
        Session::from_start(course, "Lecture", start, duration, &Tz::UTC)
    }

    #[test]
    fn test_merge_without_profile_sorts_feed() {
        let feed = vec![session("B", 5, 9, 60), session("A", 4, 9, 60)];
        let merged = merge_schedule(&feed, None, &Tz::UTC);
        let courses: Vec<&str> = merged.iter().map(|s| s.course.as_str()).collect();
        assert_eq!(courses, ["A", "B"]);
    }

    #[test]
    fn test_override_replaces_feed_copy() {
        let feed = vec![session("COMP1511", 4, 9, 60), session("MATH1131", 4, 11, 60)];

        let mut changed = feed[0].clone();
        changed.duration = 120;
        changed.end_date = changed.start_date + chrono::Duration::minutes(120);
        let extra = session("PHYS1121", 6, 14, 60);

        let mut profile = Profile::default();
        profile.set_behind(vec![changed.clone(), extra.clone()]);

        let merged = merge_schedule(&feed, Some(&profile), &Tz::UTC);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], changed);
        assert_eq!(merged[2], extra);
    }

    #[test]
    fn test_break_dates_are_dropped() {
        let feed = vec![session("COMP1511", 4, 9, 60), session("COMP1511", 5, 9, 60)];
        let profile = Profile {
            breaks: Some(vec!["2024-03-04".to_string()]),
            ..Profile::default()
        };

        let merged = merge_schedule(&feed, Some(&profile), &Tz::UTC);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start, "2024-03-05");
    }
}
