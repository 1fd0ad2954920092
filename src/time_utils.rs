// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time conversion and formatting.
//!
//! Dates travel as date-entries (`YYYY-MM-DD`, no time, no offset). They are
//! turned back into instants at local midnight in the schedule timezone.

use crate::error::{Result, TimetableError};
use crate::models::Time;
use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, SecondsFormat,
    TimeZone, Utc,
};
use chrono_tz::Tz;

/// A calendar date serialized as `YYYY-MM-DD`.
pub type DateEntry = String;

const DATE_ENTRY_FORMAT: &str = "%Y-%m-%d";

/// Format the date component of `date` (in its own timezone) as a date-entry.
pub fn to_date_entry<Z: TimeZone>(date: &DateTime<Z>) -> DateEntry {
    date.date_naive().format(DATE_ENTRY_FORMAT).to_string()
}

/// Parse a date-entry into local midnight in `tz`.
pub fn from_date_entry(entry: &str, tz: &Tz) -> Result<DateTime<Tz>> {
    let date = parse_date_entry(entry)?;
    Ok(resolve_local(tz, date.and_time(NaiveTime::MIN)))
}

/// Parse a date-entry into a calendar date.
///
/// Only the zero-padded `YYYY-MM-DD` shape is accepted.
pub fn parse_date_entry(entry: &str) -> Result<NaiveDate> {
    let trimmed = entry.trim();
    let well_formed = trimmed.len() == 10
        && trimmed.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(TimetableError::Parse(format!(
            "Invalid date entry {:?}: expected YYYY-MM-DD",
            entry
        )));
    }
    NaiveDate::parse_from_str(trimmed, DATE_ENTRY_FORMAT)
        .map_err(|e| TimetableError::Parse(format!("Invalid date entry {:?}: {}", entry, e)))
}

/// Resolve a wall-clock time in `tz` to a concrete instant.
///
/// Ambiguous times (DST fall-back) pick the earlier instant. Times inside a
/// DST gap are shifted forward by the length of the gap.
pub fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(naive - Duration::days(1)))
                .fix();
            let utc = naive - Duration::seconds(i64::from(before.local_minus_utc()));
            tz.from_utc_datetime(&utc)
        }
    }
}

/// Format a 24-hour time as a 12-hour display string, e.g. `1:05 PM`.
pub fn format_time(time: &Time) -> String {
    let hour = match time.hour % 12 {
        0 => 12,
        h => h,
    };
    let suffix = if time.hour < 12 { "AM" } else { "PM" };
    format!("{}:{:02} {}", hour, time.minute, suffix)
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a UTC timestamp with millisecond precision, e.g. `2024-03-04T09:00:00.000Z`.
pub fn format_utc_millis(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a serialized timestamp.
///
/// Accepts RFC3339 with an offset, a zone-less ISO date-time (interpreted in
/// `tz`), or a bare date (UTC midnight, as JavaScript's `Date` parses it).
pub fn parse_instant(text: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(resolve_local(tz, naive).with_timezone(&Utc));
        }
    }

    parse_date_entry(text)
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}
