//! Read path listing bookable start slots.

use crate::admin::parse_time_zone;
use crate::block::{block_window_end, contiguous_block, slots_needed};
use crate::error::BookingError;
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use coachbook_common::models::{Slot, SlotId};
use coachbook_config::AppConfig;
use coachbook_db::{DbClient, SlotRepository, SqlSlotRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_LIVE_MINUTES: i64 = 60;
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    /// Defaults to now.
    pub from: Option<DateTime<Utc>>,
    /// Defaults to `from` plus seven days.
    pub to: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "openapi", param(example = 60))]
    pub live_minutes: Option<i64>,
    /// Per-day cap overriding the configured one; 0 means unlimited.
    pub per_day: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AvailableStart {
    pub slot_id: SlotId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub block: Vec<SlotId>,
}

/// Business rules applied to candidate starts.
#[derive(Debug, Clone)]
pub struct AvailabilityRules {
    pub min_lead: Duration,
    pub max_advance: Duration,
    pub hours_start: u32,
    /// Exclusive; 24 allows starts up to midnight.
    pub hours_end: u32,
    /// Allowed minute-of-hour values for starts. Empty allows any.
    pub minute_starts: Vec<u32>,
    /// 0 means unlimited.
    pub per_day_cap: usize,
    pub hide_held: bool,
    pub time_zone: Tz,
    pub slot_minutes: i64,
}

impl AvailabilityRules {
    pub fn from_config(config: &AppConfig) -> Self {
        let availability = &config.availability;
        let time_zone = parse_time_zone(&config.booking.time_zone);
        Self {
            min_lead: Duration::minutes(availability.min_lead_minutes),
            max_advance: Duration::days(availability.max_advance_days),
            hours_start: availability.hours_start,
            hours_end: availability.hours_end,
            minute_starts: availability.minute_starts.clone(),
            per_day_cap: availability.per_day_cap,
            hide_held: availability.hide_held,
            time_zone,
            slot_minutes: config.booking.slot_minutes,
        }
    }

    fn start_allowed(&self, start: DateTime<Utc>) -> bool {
        let local = start.with_timezone(&self.time_zone);
        let hour = local.hour();
        let minute_ok = self.minute_starts.is_empty() || self.minute_starts.contains(&local.minute());
        hour >= self.hours_start && hour < self.hours_end && minute_ok
    }

    fn local_date(&self, start: DateTime<Utc>) -> NaiveDate {
        start.with_timezone(&self.time_zone).date_naive()
    }
}

/// Filters `slots` (ascending by start, covering `[from, to + live_minutes)`) down to
/// the starts that can carry a full block right now.
///
/// The per-day cap counts returned starts in chronological order, so earlier starts
/// of a day win.
pub fn available_starts(
    slots: &[Slot],
    rules: &AvailabilityRules,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    live_minutes: i64,
    now: DateTime<Utc>,
) -> Vec<AvailableStart> {
    let window_start = from.max(now + rules.min_lead);
    let window_end = to.min(now + rules.max_advance);
    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    let mut starts = Vec::new();

    for (i, slot) in slots.iter().enumerate() {
        if slot.start_time < window_start || slot.start_time >= window_end || slot.is_taken {
            continue;
        }
        if !rules.start_allowed(slot.start_time) {
            continue;
        }

        let Ok(end) = block_window_end(slot.start_time, live_minutes) else {
            continue;
        };
        let len = slots[i..].partition_point(|s| s.start_time < end);
        let window = &slots[i..i + len];
        let Some(block) =
            contiguous_block(slot.start_time, window, live_minutes, rules.slot_minutes)
        else {
            continue;
        };
        if rules.hide_held && window.iter().any(|s| s.has_live_hold(now)) {
            continue;
        }

        if rules.per_day_cap > 0 {
            let count = per_day.entry(rules.local_date(slot.start_time)).or_insert(0);
            if *count >= rules.per_day_cap {
                continue;
            }
            *count += 1;
        }

        starts.push(AvailableStart {
            slot_id: slot.id,
            start_time: slot.start_time,
            end_time: end,
            block,
        });
    }
    starts
}

/// Lists bookable starts from the current slot table.
pub async fn list_available_starts(
    db: &DbClient,
    config: &AppConfig,
    query: &AvailabilityQuery,
    now: DateTime<Utc>,
) -> Result<Vec<AvailableStart>, BookingError> {
    let live_minutes = query.live_minutes.unwrap_or(DEFAULT_LIVE_MINUTES);
    let max_minutes = config
        .booking
        .checkout_max_minutes
        .max(config.booking.direct_max_minutes);
    if slots_needed(live_minutes, config.booking.slot_minutes) == 0 || live_minutes > max_minutes {
        return Err(BookingError::validation(format!(
            "liveMinutes must be between 1 and {}",
            max_minutes
        )));
    }

    let from = query.from.unwrap_or(now);
    let to = match query.to {
        Some(to) => to,
        None => from
            .checked_add_signed(Duration::days(DEFAULT_WINDOW_DAYS))
            .ok_or_else(|| BookingError::validation("'from' is out of range"))?,
    };
    if to <= from {
        return Err(BookingError::validation("'to' must be after 'from'"));
    }

    let mut rules = AvailabilityRules::from_config(config);
    if let Some(cap) = query.per_day {
        rules.per_day_cap = cap;
    }

    let slots = SqlSlotRepository::new(db.clone())
        .list_range(from, block_window_end(to, live_minutes)?)
        .await?;
    let starts = available_starts(&slots, &rules, from, to, live_minutes, now);
    debug!(
        candidates = slots.len(),
        returned = starts.len(),
        live_minutes,
        "Availability computed"
    );
    Ok(starts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rules() -> AvailabilityRules {
        AvailabilityRules {
            min_lead: Duration::minutes(240),
            max_advance: Duration::days(45),
            hours_start: 13,
            hours_end: 24,
            minute_starts: vec![0, 30],
            per_day_cap: 0,
            hide_held: true,
            time_zone: Tz::UTC,
            slot_minutes: 15,
        }
    }

    fn day(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap()
    }

    /// Quarter hours 13:00-23:45 on the given days, ids counting from 1.
    fn seeded(days: &[u32]) -> Vec<Slot> {
        let mut id = 0;
        let mut slots = Vec::new();
        for d in days {
            for q in 0..44 {
                id += 1;
                slots.push(Slot {
                    id,
                    start_time: day(*d, 13, 0) + Duration::minutes(15 * q),
                    duration_min: 15,
                    is_taken: false,
                    hold_until: None,
                    hold_key: None,
                });
            }
        }
        slots
    }

    #[test]
    fn lead_time_hides_early_starts() {
        let slots = seeded(&[2]);
        let now = day(2, 12, 0);
        let starts = available_starts(&slots, &rules(), day(2, 0, 0), day(3, 0, 0), 60, now);
        assert!(starts.iter().all(|s| s.start_time >= now + Duration::minutes(240)));
        assert_eq!(starts.first().map(|s| s.start_time), Some(day(2, 16, 0)));
    }

    #[test]
    fn only_whole_and_half_hours_with_full_blocks() {
        let slots = seeded(&[2]);
        let starts = available_starts(&slots, &rules(), day(2, 0, 0), day(3, 0, 0), 60, day(1, 0, 0));
        assert!(starts.iter().all(|s| [0, 30].contains(&s.start_time.minute())));
        // 23:00 is the last start with four quarter hours left in the day.
        assert_eq!(starts.last().map(|s| s.start_time), Some(day(2, 23, 0)));
        assert!(starts.iter().all(|s| s.block.len() == 4));
    }

    #[test]
    fn taken_slot_removes_every_overlapping_start() {
        let mut slots = seeded(&[2]);
        let taken = slots
            .iter_mut()
            .find(|s| s.start_time == day(2, 14, 15))
            .unwrap();
        taken.is_taken = true;
        let starts = available_starts(&slots, &rules(), day(2, 0, 0), day(3, 0, 0), 60, day(1, 0, 0));
        let times: Vec<_> = starts.iter().map(|s| s.start_time).collect();
        assert!(times.contains(&day(2, 13, 0)));
        assert!(!times.contains(&day(2, 13, 30)));
        assert!(!times.contains(&day(2, 14, 0)));
        assert!(times.contains(&day(2, 14, 30)));
    }

    #[test]
    fn per_day_cap_prefers_earlier_starts() {
        let slots = seeded(&[2, 3]);
        let mut rules = rules();
        rules.per_day_cap = 2;
        let starts = available_starts(&slots, &rules, day(2, 0, 0), day(4, 0, 0), 60, day(1, 0, 0));
        let times: Vec<_> = starts.iter().map(|s| s.start_time).collect();
        assert_eq!(
            times,
            vec![day(2, 13, 0), day(2, 13, 30), day(3, 13, 0), day(3, 13, 30)]
        );
    }

    #[test]
    fn live_holds_are_hidden_and_lapsed_ones_are_not() {
        let mut slots = seeded(&[2]);
        let now = day(1, 0, 0);
        slots[1].hold_until = Some(now + Duration::minutes(5));
        slots[2].hold_until = Some(now - Duration::minutes(5));
        let starts = available_starts(&slots, &rules(), day(2, 0, 0), day(3, 0, 0), 30, now);
        let times: Vec<_> = starts.iter().map(|s| s.start_time).collect();
        assert!(!times.contains(&day(2, 13, 0)), "13:15 is held");
        assert!(times.contains(&day(2, 13, 30)), "13:30 hold has lapsed");
    }

    #[test]
    fn max_advance_cuts_the_window() {
        let slots = seeded(&[2, 20]);
        let mut rules = rules();
        rules.max_advance = Duration::days(5);
        let starts = available_starts(&slots, &rules, day(1, 0, 0), day(30, 0, 0), 60, day(1, 0, 0));
        assert!(starts.iter().all(|s| s.start_time < day(6, 0, 0)));
        assert!(!starts.is_empty());
    }

    #[test]
    fn hours_follow_the_configured_time_zone() {
        let slots = seeded(&[2]);
        let mut rules = rules();
        rules.time_zone = Tz::Europe__Zurich; // UTC+2 in June
        rules.hours_start = 18;
        let starts = available_starts(&slots, &rules, day(2, 0, 0), day(3, 0, 0), 60, day(1, 0, 0));
        // 18:00 Zurich is 16:00 UTC; 22:00 UTC is midnight Zurich.
        assert_eq!(starts.first().map(|s| s.start_time), Some(day(2, 16, 0)));
        assert!(starts.iter().all(|s| s.start_time < day(2, 22, 0)));
    }
}
