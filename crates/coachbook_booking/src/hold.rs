//! Advisory holds on slots during checkout.
//!
//! A hold keeps other buyers from being shown the same block while someone pays. It
//! expires by timestamp comparison only and is never what guarantees exclusivity;
//! finalization's conditional update does that.

use crate::error::BookingError;
use chrono::{DateTime, Duration, Utc};
use coachbook_common::models::SlotId;
use coachbook_db::{DbConnection, SqlSlotRepository};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    /// The slot was free (or its hold had lapsed) and is now held.
    Acquired,
    /// A live hold compatible with the presented key was extended.
    Refreshed,
}

/// Takes or extends the hold on one slot.
///
/// * taken or missing slot: [`BookingError::Unavailable`]
/// * lapsed hold: cleared; [`BookingError::HoldExpired`] if `key` is the lapsed
///   hold's key, otherwise the hold is taken fresh
/// * live hold under a different key than `key`: [`BookingError::HoldMismatch`]
/// * otherwise `hold_until = now + ttl`, keeping the stored key when `key` is `None`
pub async fn acquire_or_refresh_hold(
    conn: &mut DbConnection,
    slot_id: SlotId,
    key: Option<&str>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<HoldOutcome, BookingError> {
    let slot = SqlSlotRepository::find_by_id_in(conn, slot_id)
        .await?
        .ok_or(BookingError::Unavailable)?;
    if slot.is_taken {
        return Err(BookingError::Unavailable);
    }

    let outcome = match slot.hold_until {
        Some(until) if until <= now => {
            SqlSlotRepository::clear_hold_in(conn, slot_id).await?;
            if key.is_some() && key == slot.hold_key.as_deref() {
                info!(slot_id, "Hold expired before checkout resumed");
                return Err(BookingError::HoldExpired);
            }
            debug!(slot_id, "Cleared lapsed hold");
            HoldOutcome::Acquired
        }
        Some(_) => match (key, slot.hold_key.as_deref()) {
            (Some(presented), Some(stored)) if presented != stored => {
                debug!(slot_id, "Slot held under another key");
                return Err(BookingError::HoldMismatch);
            }
            _ => HoldOutcome::Refreshed,
        },
        None => HoldOutcome::Acquired,
    };

    let stored_key = match (key, outcome) {
        (Some(k), _) => Some(k),
        (None, HoldOutcome::Refreshed) => slot.hold_key.as_deref(),
        (None, HoldOutcome::Acquired) => None,
    };
    SqlSlotRepository::set_hold_in(conn, slot_id, now + ttl, stored_key).await?;
    Ok(outcome)
}

/// Holds every slot of a block under one key. Stops at the first slot that can't be
/// held; the caller's transaction rollback undoes the earlier ones.
///
/// On [`BookingError::HoldExpired`] every hold under `key` in the block is dropped,
/// so committing leaves the block clean for a fresh attempt.
pub async fn hold_block(
    conn: &mut DbConnection,
    block: &[SlotId],
    key: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<DateTime<Utc>, BookingError> {
    for slot_id in block {
        match acquire_or_refresh_hold(conn, *slot_id, Some(key), now, ttl).await {
            Ok(_) => {}
            Err(BookingError::HoldExpired) => {
                SqlSlotRepository::release_holds_in(conn, block, key).await?;
                return Err(BookingError::HoldExpired);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(now + ttl)
}
