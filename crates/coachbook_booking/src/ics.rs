//! Calendar invite (`.ics`) rendering.

use crate::error::BookingError;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use icalendar::{Calendar, Component, Event as IcalEvent, EventLike};
use serde::Deserialize;
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "Coaching Session";
pub const DEFAULT_MINUTES: i64 = 60;
pub const MAX_MINUTES: i64 = 600;

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct InviteQuery {
    pub title: Option<String>,
    /// RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
    pub start: String,
    pub minutes: Option<i64>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// A validated invite.
#[derive(Debug, Clone, PartialEq)]
pub struct Invite {
    pub title: String,
    pub start: DateTime<Utc>,
    pub minutes: i64,
    pub location: Option<String>,
    pub description: Option<String>,
}

fn parse_start(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl TryFrom<&InviteQuery> for Invite {
    type Error = BookingError;

    fn try_from(query: &InviteQuery) -> Result<Self, Self::Error> {
        let minutes = query.minutes.unwrap_or(DEFAULT_MINUTES);
        if !(1..=MAX_MINUTES).contains(&minutes) {
            return Err(BookingError::validation(format!(
                "minutes must be between 1 and {}",
                MAX_MINUTES
            )));
        }
        let start = parse_start(&query.start)
            .filter(|start| start.checked_add_signed(Duration::minutes(minutes)).is_some())
            .ok_or_else(|| BookingError::validation("Invalid start datetime"))?;
        Ok(Invite {
            title: non_blank(&query.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            start,
            minutes,
            location: non_blank(&query.location),
            description: non_blank(&query.description),
        })
    }
}

/// Line breaks inside a text property would end the content line early.
fn one_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|part| !part.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders a single-event VCALENDAR. Times are written in UTC and long
/// content lines are folded by the `icalendar` writer.
pub fn render_invite(invite: &Invite, now: DateTime<Utc>) -> String {
    let end = invite
        .start
        .checked_add_signed(Duration::minutes(invite.minutes))
        .unwrap_or(invite.start);
    let mut event = IcalEvent::new();
    event
        .summary(&one_line(&invite.title))
        .starts(invite.start)
        .ends(end)
        .uid(&Uuid::new_v4().to_string())
        .timestamp(now);
    if let Some(description) = &invite.description {
        event.description(&one_line(description));
    }
    if let Some(location) = &invite.location {
        event.location(&one_line(location));
    }

    let mut calendar = Calendar::new();
    calendar.push(event.done());
    calendar.to_string()
}
