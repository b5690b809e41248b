//! Booking without payment: the block is marked taken right away and the booking is
//! stored as pending.

use crate::block::resolve_block;
use crate::error::BookingError;
use chrono::{DateTime, Utc};
use coachbook_common::models::{Booking, BookingStatus, SlotId};
use coachbook_config::BookingConfig;
use coachbook_db::{DbClient, SqlBookingRepository, SqlSlotRepository};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

const MIN_HANDLE_LEN: usize = 2;
const MAX_HANDLE_LEN: usize = 64;
const MAX_NOTES_LEN: usize = 500;
const MAX_SESSION_TYPE_LEN: usize = 64;

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DirectBookingRequest {
    #[cfg_attr(feature = "openapi", schema(example = 42))]
    pub slot_id: SlotId,
    #[cfg_attr(feature = "openapi", schema(example = "Replay Analysis"))]
    pub session_type: String,
    #[cfg_attr(feature = "openapi", schema(example = 45))]
    pub live_minutes: i64,
    #[cfg_attr(feature = "openapi", schema(example = "player#1234"))]
    pub discord: String,
    #[serde(default)]
    pub in_game: bool,
    #[serde(default)]
    pub followups: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

fn validate(request: &DirectBookingRequest, config: &BookingConfig) -> Result<(), BookingError> {
    let session_type = request.session_type.trim();
    if session_type.is_empty() || session_type.chars().count() > MAX_SESSION_TYPE_LEN {
        return Err(BookingError::validation("sessionType must be 1-64 characters"));
    }
    if request.live_minutes < config.direct_min_minutes
        || request.live_minutes > config.direct_max_minutes
    {
        return Err(BookingError::validation(format!(
            "liveMinutes must be between {} and {}",
            config.direct_min_minutes, config.direct_max_minutes
        )));
    }
    let handle_len = request.discord.trim().chars().count();
    if !(MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&handle_len) {
        return Err(BookingError::validation("discord must be 2-64 characters"));
    }
    if !(0..=config.max_followups).contains(&request.followups) {
        return Err(BookingError::validation(format!(
            "followups must be between 0 and {}",
            config.max_followups
        )));
    }
    if let Some(notes) = &request.notes {
        if notes.chars().count() > MAX_NOTES_LEN {
            return Err(BookingError::validation("notes must be at most 500 characters"));
        }
    }
    Ok(())
}

/// Reserves the block starting at `request.slot_id` and records a pending booking.
///
/// A block that overlaps someone's live checkout hold is treated as unavailable.
/// Every slot is flipped with a conditional update; if any of them was taken in the
/// meantime nothing is written.
pub async fn create_direct_booking(
    db: &DbClient,
    config: &BookingConfig,
    request: &DirectBookingRequest,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    validate(request, config)?;

    let mut tx = db.begin_write().await?;
    let block = resolve_block(
        &mut tx,
        request.slot_id,
        request.live_minutes,
        config.slot_minutes,
    )
    .await?;
    if block.has_live_hold(now) {
        return Err(BookingError::Unavailable);
    }
    if SqlBookingRepository::find_by_slot_in(&mut tx, block.start.id)
        .await?
        .is_some()
    {
        return Err(BookingError::Unavailable);
    }

    let ids = block.ids();
    let marked = SqlSlotRepository::mark_taken_if_free_in(&mut tx, &ids).await?;
    if marked < ids.len() as u64 {
        tx.rollback().await?;
        warn!(
            slot_id = request.slot_id,
            marked,
            needed = ids.len(),
            "Direct booking lost the race for its block"
        );
        return Err(BookingError::Unavailable);
    }

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        slot_id: block.start.id,
        session_type: request.session_type.trim().to_string(),
        live_minutes: request.live_minutes,
        block: ids,
        status: BookingStatus::Pending,
        discord: request.discord.trim().to_string(),
        in_game: request.in_game,
        followups: request.followups,
        notes: request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        amount_cents: None,
        currency: None,
        provider: None,
        provider_ref: None,
        payer_email: None,
        created_at: now,
    };
    SqlBookingRepository::insert_in(&mut tx, &booking).await?;
    tx.commit().await?;

    info!(
        booking_id = %booking.id,
        slot_id = booking.slot_id,
        block = ?booking.block,
        "Direct booking created"
    );
    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DirectBookingRequest {
        DirectBookingRequest {
            slot_id: 1,
            session_type: "Replay Analysis".to_string(),
            live_minutes: 45,
            discord: "player#1234".to_string(),
            in_game: false,
            followups: 0,
            notes: None,
        }
    }

    #[test]
    fn direct_bounds_differ_from_checkout() {
        let config = BookingConfig::default();
        let mut req = request();
        req.live_minutes = 15;
        assert!(validate(&req, &config).is_ok());
        req.live_minutes = 10;
        assert!(validate(&req, &config).is_err());
        req.live_minutes = 121;
        assert!(validate(&req, &config).is_err());
    }

    #[test]
    fn handle_notes_and_followups_are_checked() {
        let config = BookingConfig::default();

        let mut req = request();
        req.discord = "a".to_string();
        assert!(validate(&req, &config).is_err());

        let mut req = request();
        req.notes = Some("n".repeat(501));
        assert!(validate(&req, &config).is_err());
        req.notes = Some("n".repeat(500));
        assert!(validate(&req, &config).is_ok());

        let mut req = request();
        req.followups = 5;
        assert!(matches!(
            validate(&req, &config),
            Err(BookingError::Validation(_))
        ));
    }
}
