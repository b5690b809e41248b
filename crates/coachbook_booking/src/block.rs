//! Block resolution: turning a start slot and a duration into the run of contiguous
//! quarter-hour slots that covers it.

use crate::error::BookingError;
use chrono::{DateTime, Duration, Utc};
use coachbook_common::models::{Slot, SlotId};
use coachbook_db::{DbConnection, SqlSlotRepository};
use tracing::debug;

/// Number of atomic slots covering `live_minutes`, rounded up.
pub fn slots_needed(live_minutes: i64, slot_minutes: i64) -> usize {
    if live_minutes <= 0 || slot_minutes <= 0 {
        return 0;
    }
    ((live_minutes + slot_minutes - 1) / slot_minutes) as usize
}

/// End of the window whose slot starts make up a block. Fails with a validation
/// error when the end falls outside the representable time range.
pub fn block_window_end(
    start: DateTime<Utc>,
    live_minutes: i64,
) -> Result<DateTime<Utc>, BookingError> {
    Duration::try_minutes(live_minutes)
        .and_then(|length| start.checked_add_signed(length))
        .ok_or_else(|| BookingError::validation("Time window is out of range"))
}

/// Picks the block for `start` out of `candidates`, the slots starting in
/// `[start, start + live_minutes)` in ascending order.
///
/// Returns the ids only if exactly the needed number of slots are present, each sits
/// on its grid position `start + i * slot_minutes`, and none is taken.
pub fn contiguous_block(
    start: DateTime<Utc>,
    candidates: &[Slot],
    live_minutes: i64,
    slot_minutes: i64,
) -> Option<Vec<SlotId>> {
    let need = slots_needed(live_minutes, slot_minutes);
    if need == 0 || candidates.len() != need {
        return None;
    }
    let on_grid = candidates
        .iter()
        .enumerate()
        .all(|(i, slot)| slot.start_time == start + Duration::minutes(slot_minutes * i as i64));
    if !on_grid || candidates.iter().any(|slot| slot.is_taken) {
        return None;
    }
    Some(candidates.iter().map(|slot| slot.id).collect())
}

/// A block that was free when it was read.
#[derive(Debug, Clone)]
pub struct ResolvedBlock {
    /// The anchor slot.
    pub start: Slot,
    /// Every slot of the block in start order, anchor included.
    pub slots: Vec<Slot>,
}

impl ResolvedBlock {
    pub fn ids(&self) -> Vec<SlotId> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    pub fn has_live_hold(&self, now: DateTime<Utc>) -> bool {
        self.slots.iter().any(|slot| slot.has_live_hold(now))
    }
}

/// Resolves the block starting at `start_id` on `conn`.
///
/// Run it on the same transaction as whatever write depends on the answer.
pub async fn resolve_block(
    conn: &mut DbConnection,
    start_id: SlotId,
    live_minutes: i64,
    slot_minutes: i64,
) -> Result<ResolvedBlock, BookingError> {
    if live_minutes <= 0 {
        return Err(BookingError::validation("liveMinutes must be positive"));
    }
    let start = SqlSlotRepository::find_by_id_in(conn, start_id)
        .await?
        .ok_or(BookingError::Unavailable)?;

    let candidates = SqlSlotRepository::list_range_in(
        conn,
        start.start_time,
        block_window_end(start.start_time, live_minutes)?,
    )
    .await?;

    match contiguous_block(start.start_time, &candidates, live_minutes, slot_minutes) {
        Some(ids) => {
            debug!(start_id, live_minutes, block = ?ids, "Resolved block");
            Ok(ResolvedBlock {
                start,
                slots: candidates,
            })
        }
        None => {
            debug!(
                start_id,
                live_minutes,
                found = candidates.len(),
                "Block unavailable"
            );
            Err(BookingError::Unavailable)
        }
    }
}
