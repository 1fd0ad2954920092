// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session normalization.
//!
//! Backfills `startDate`/`endDate` and re-keys ids on stored records so that
//! every consumer sees the current session shape. Normalizing an already
//! normalized session returns it unchanged.

use crate::models::session::{make_id, Session};
use crate::models::stored::{LegacySession, StoredInstant, StoredSession};
use crate::time_utils::{from_date_entry, parse_instant};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

/// Normalize one stored record into the current session shape.
pub fn normalize(record: StoredSession, tz: &Tz) -> Session {
    let mut session = match record {
        StoredSession::Current(session) => session,
        StoredSession::Legacy(legacy) => from_legacy(legacy, tz),
    };

    if !session.has_current_id() {
        let id = make_id(&session);
        tracing::debug!(old_id = %session.id, new_id = %id, "Re-keyed stored session");
        session.id = id;
    }

    session
}

/// Normalize every record, preserving order.
pub fn normalize_all(records: impl IntoIterator<Item = StoredSession>, tz: &Tz) -> Vec<Session> {
    records.into_iter().map(|r| normalize(r, tz)).collect()
}

fn from_legacy(legacy: LegacySession, tz: &Tz) -> Session {
    let start_date = match &legacy.start_date {
        Some(instant) => resolve_instant(instant, tz),
        None => from_date_entry(&legacy.start, tz).ok().and_then(|midnight| {
            let offset = Duration::try_hours(i64::from(legacy.time.hour))?
                .checked_add(&Duration::try_minutes(i64::from(legacy.time.minute))?)?;
            midnight.with_timezone(&Utc).checked_add_signed(offset)
        }),
    };
    let start_date = valid_or_now("startDate", start_date);

    let end_date = match &legacy.end_date {
        Some(instant) => resolve_instant(instant, tz),
        None => Duration::try_minutes(i64::from(legacy.duration))
            .and_then(|length| start_date.checked_add_signed(length)),
    };
    let end_date = valid_or_now("endDate", end_date);

    Session {
        id: legacy.id.unwrap_or_default(),
        course: legacy.course,
        activity: legacy.activity,
        day: legacy.day,
        time: legacy.time,
        duration: legacy.duration,
        frequency: legacy.frequency,
        start: legacy.start,
        start_date,
        end_date,
    }
}

fn resolve_instant(instant: &StoredInstant, tz: &Tz) -> Option<DateTime<Utc>> {
    match instant {
        StoredInstant::Timestamp(ts) => ts.to_date_time(),
        StoredInstant::Native(dt) => Some(*dt),
        StoredInstant::Text(text) => parse_instant(text, tz),
    }
}

/// Unresolvable dates are a bug in whoever wrote the record. Debug builds
/// stop here; release builds log and substitute the current time.
fn valid_or_now(field: &'static str, resolved: Option<DateTime<Utc>>) -> DateTime<Utc> {
    debug_assert!(resolved.is_some(), "{} is not a valid date", field);
    resolved.unwrap_or_else(|| {
        tracing::error!(field, "Stored session date is invalid, using current time");
        Utc::now()
    })
}
