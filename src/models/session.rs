// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Course session model, identity and ordering.

use crate::time_utils::{format_utc_millis, to_date_entry, DateEntry};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Prefix carried by every current-format session id.
///
/// Bump this when the id derivation changes; stored overrides with an older
/// prefix are re-keyed by the normalizer.
pub const ID_PREFIX: &str = "v4|";

const ID_SEPARATOR: char = '|';
const ID_ESCAPE: char = '\\';

/// Time of day, 24-hour clock, no timezone.
///
/// Deserialization rejects hours above 23 and minutes above 59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTime")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct Time {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Deserialize)]
struct RawTime {
    hour: u32,
    minute: u32,
}

impl TryFrom<RawTime> for Time {
    type Error = String;

    fn try_from(raw: RawTime) -> Result<Self, Self::Error> {
        if raw.hour > 23 || raw.minute > 59 {
            return Err(format!(
                "time of day {}:{:02} is out of range",
                raw.hour, raw.minute
            ));
        }
        Ok(Self::new(raw.hour, raw.minute))
    }
}

impl Time {
    pub const fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    /// Time of day of any chrono value carrying a clock time.
    pub fn of<T: Timelike>(value: &T) -> Self {
        Self::new(value.hour(), value.minute())
    }
}

/// One scheduled occurrence of a course activity.
///
/// `start_date` and `end_date` are derived from `start`, `time` and
/// `duration`; the normalizer guarantees they are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct Session {
    pub id: String,
    /// Course code, e.g. `COMP1511`
    pub course: String,
    /// Activity type and section, e.g. `Lecture, 01`
    pub activity: String,
    /// Day of week of `start`, 0 = Sunday
    pub day: u8,
    pub time: Time,
    /// Length in whole minutes
    pub duration: u32,
    /// Recurrence interval in weeks (always 1 for feed-derived sessions)
    pub frequency: u32,
    /// Occurrence date
    pub start: DateEntry,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_date: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub end_date: DateTime<Utc>,
}

impl Session {
    /// Build a single-occurrence session from its start instant, deriving
    /// every other field in the schedule timezone `tz`.
    pub fn from_start(
        course: impl Into<String>,
        activity: impl Into<String>,
        start_date: DateTime<Utc>,
        duration: u32,
        tz: &Tz,
    ) -> Self {
        let local = start_date.with_timezone(tz);
        let mut session = Self {
            id: String::new(),
            course: course.into(),
            activity: activity.into(),
            day: local.weekday().num_days_from_sunday() as u8,
            time: Time::of(&local),
            duration,
            frequency: 1,
            start: to_date_entry(&local),
            start_date,
            end_date: start_date + Duration::minutes(i64::from(duration)),
        };
        session.id = make_id(&session);
        session
    }

    /// Whether `id` was derived with the current id format.
    pub fn has_current_id(&self) -> bool {
        self.id.starts_with(ID_PREFIX)
    }
}

/// Derive the stable identifier of a session.
///
/// Only `course`, `activity` and `start_date` take part, so re-fetched copies
/// of the same occurrence always collide. The separator and escape characters
/// are backslash-escaped inside names; names without them produce exactly
/// `v4|<course>|<activity>|<start_date>`.
pub fn make_id(session: &Session) -> String {
    let course = escape_id_part(&session.course);
    let activity = escape_id_part(&session.activity);
    let start = format_utc_millis(&session.start_date);

    let mut id =
        String::with_capacity(ID_PREFIX.len() + course.len() + activity.len() + start.len() + 2);
    id.push_str(ID_PREFIX);
    id.push_str(&course);
    id.push(ID_SEPARATOR);
    id.push_str(&activity);
    id.push(ID_SEPARATOR);
    id.push_str(&start);
    id
}

fn escape_id_part(part: &str) -> Cow<'_, str> {
    if !part.contains(|c| c == ID_SEPARATOR || c == ID_ESCAPE) {
        return Cow::Borrowed(part);
    }

    let mut escaped = String::with_capacity(part.len() + 4);
    for c in part.chars() {
        if c == ID_SEPARATOR || c == ID_ESCAPE {
            escaped.push(ID_ESCAPE);
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Canonical display order: date, hour, minute, then shorter sessions first.
pub fn compare_sessions(a: &Session, b: &Session) -> Ordering {
    a.start
        .cmp(&b.start)
        .then_with(|| a.time.hour.cmp(&b.time.hour))
        .then_with(|| a.time.minute.cmp(&b.time.minute))
        .then_with(|| a.duration.cmp(&b.duration))
}

/// Stable sort in canonical order.
pub fn sort_sessions(sessions: &mut [Session]) {
    sessions.sort_by(compare_sessions);
}
