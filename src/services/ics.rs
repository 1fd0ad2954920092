// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Timetable feed parsing using the icalendar crate's parser.
//!
//! Each VEVENT becomes one session. The course and activity come from the
//! first line of the event description, which timetable exports format as
//! `COURSE_TERM_..., Activity, Section`.

use crate::error::{Result, TimetableError};
use crate::models::session::{sort_sessions, Session};
use crate::time_utils::resolve_local;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use icalendar::{
    parser::{read_calendar, unfold, Component},
    CalendarDateTime, DatePerhapsTime,
};

/// The parts of a VEVENT a session is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub uid: Option<String>,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub duration: Duration,
}

/// Parse, map and sort a whole feed.
pub fn sessions_from_ics(content: &str, tz: &Tz) -> Result<Vec<Session>> {
    let events = parse_events(content, tz)?;
    let mut sessions = events
        .iter()
        .map(|event| event_to_session(event, tz))
        .collect::<Result<Vec<_>>>()?;
    sort_sessions(&mut sessions);
    Ok(sessions)
}

/// Parse ICS content into its events. Non-event components are ignored.
pub fn parse_events(content: &str, tz: &Tz) -> Result<Vec<CalendarEvent>> {
    let unfolded = unfold(content);
    if !unfolded.trim_start().starts_with("BEGIN:VCALENDAR") {
        return Err(TimetableError::Parse(
            "Feed is not an iCalendar document".to_string(),
        ));
    }
    let calendar = read_calendar(&unfolded)
        .map_err(|e| TimetableError::Parse(format!("Invalid calendar feed: {}", e)))?;

    let mut vevents = Vec::new();
    collect_events(&calendar.components, &mut vevents);

    vevents.into_iter().map(|c| to_event(c, tz)).collect()
}

fn collect_events<'c, 'a>(components: &'c [Component<'a>], out: &mut Vec<&'c Component<'a>>) {
    for component in components {
        if component.name == "VEVENT" {
            out.push(component);
        } else {
            collect_events(&component.components, out);
        }
    }
}

fn to_event(vevent: &Component<'_>, tz: &Tz) -> Result<CalendarEvent> {
    let uid = vevent.find_prop("UID").map(|p| p.val.to_string());

    let dtstart = vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .ok_or_else(|| {
            TimetableError::Mapping(format!(
                "Event {} has no usable DTSTART",
                uid.as_deref().unwrap_or("<no uid>")
            ))
        })?;
    let all_day = matches!(dtstart, DatePerhapsTime::Date(_));
    let start = to_instant(dtstart, tz);

    let duration = match vevent.find_prop("DURATION") {
        Some(prop) => parse_duration(prop.val.as_ref())?,
        None => match vevent
            .find_prop("DTEND")
            .and_then(|p| DatePerhapsTime::try_from(p).ok())
        {
            Some(end) => to_instant(end, tz) - start,
            // RFC 5545: a date-only event lasts one day, a timed one is instantaneous.
            None if all_day => Duration::days(1),
            None => Duration::zero(),
        },
    };

    let description = vevent
        .find_prop("DESCRIPTION")
        .map(|p| unescape_text(p.val.as_ref()));

    Ok(CalendarEvent {
        uid,
        description,
        start,
        duration,
    })
}

/// Convert icalendar's DatePerhapsTime to an instant.
///
/// Floating times and all-day dates are wall-clock time in `tz`; unknown
/// TZIDs fall back to `tz` as well.
fn to_instant(dpt: DatePerhapsTime, tz: &Tz) -> DateTime<Utc> {
    match dpt {
        DatePerhapsTime::Date(d) => resolve_local(tz, d.and_time(NaiveTime::MIN)).with_timezone(&Utc),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => dt,
            CalendarDateTime::Floating(naive) => resolve_local(tz, naive).with_timezone(&Utc),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                let zone = tzid.parse::<Tz>().unwrap_or_else(|_| {
                    tracing::warn!(tzid = %tzid, "Unknown TZID, using schedule timezone");
                    *tz
                });
                resolve_local(&zone, date_time).with_timezone(&Utc)
            }
        },
    }
}

/// Parse a DURATION value such as `PT1H30M` or `-P1D`.
fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let parsed = iso8601::duration(body)
        .map_err(|e| TimetableError::Parse(format!("Invalid DURATION {:?}: {}", value, e)))?;
    let std_duration: std::time::Duration = parsed.into();
    let duration = Duration::from_std(std_duration)
        .map_err(|e| TimetableError::Parse(format!("DURATION out of range: {}", e)))?;

    Ok(if negative { -duration } else { duration })
}

/// Undo RFC 5545 TEXT escaping (`\n`, `\,`, `\;`, `\\`).
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Map one event to a session.
///
/// Durations are truncated to whole minutes.
pub fn event_to_session(event: &CalendarEvent, tz: &Tz) -> Result<Session> {
    let description = event.description.as_deref().ok_or_else(|| {
        TimetableError::Mapping(format!(
            "Event {} has no description",
            event.uid.as_deref().unwrap_or("<no uid>")
        ))
    })?;

    let top = description.lines().next().unwrap_or_default().trim_end();
    if top.is_empty() {
        return Err(TimetableError::Mapping(format!(
            "Event {} has an empty description",
            event.uid.as_deref().unwrap_or("<no uid>")
        )));
    }

    let course = top.split('_').next().unwrap_or_default();
    let activity = top.split(", ").skip(1).collect::<Vec<_>>().join(", ");

    let seconds = event.duration.num_seconds();
    if seconds < 0 {
        return Err(TimetableError::Mapping(format!(
            "Event {} ends before it starts",
            event.uid.as_deref().unwrap_or("<no uid>")
        )));
    }
    if seconds % 60 != 0 {
        tracing::debug!(seconds, course, "Truncating fractional-minute duration");
    }
    let minutes = u32::try_from(seconds / 60)
        .map_err(|_| TimetableError::Mapping(format!("Duration of {}s is too long", seconds)))?;

    Ok(Session::from_start(course, activity, event.start, minutes, tz))
}
