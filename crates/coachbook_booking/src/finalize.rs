//! Finalization of confirmed payments.
//!
//! Both providers normalize their confirmation into a [`PaymentConfirmation`] and end
//! up here. Per event id the state moves from unseen to reserved-and-booked exactly
//! once: ledger insert, block mark and paid-booking upsert share one transaction.

use crate::block::block_window_end;
use crate::error::BookingError;
use chrono::{DateTime, Utc};
use coachbook_common::models::{Booking, BookingStatus, PaymentConfirmation, SlotId};
use coachbook_common::services::PaymentService;
use coachbook_db::{
    DbClient, DbConnection, PaidUpsert, SqlBookingRepository, SqlProcessedEventRepository,
    SqlSlotRepository,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum FinalizeOutcome {
    /// Every slot of the block transitioned to taken and the booking is paid.
    #[serde(rename_all = "camelCase")]
    Finalized { booking_id: String },
    /// Payment recorded, but `unavailable` slots of the block were already taken or
    /// gone, or the anchor was already paid by another payment whose record is
    /// kept. Either way a double booking that has to be settled by hand.
    #[serde(rename_all = "camelCase")]
    Conflicted { booking_id: String, unavailable: usize },
    /// The event id is already in the ledger; nothing was changed.
    AlreadyProcessed,
}

impl FinalizeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeOutcome::Finalized { .. } => "finalized",
            FinalizeOutcome::Conflicted { .. } => "conflicted",
            FinalizeOutcome::AlreadyProcessed => "alreadyProcessed",
        }
    }

    pub fn booking_id(&self) -> Option<&str> {
        match self {
            FinalizeOutcome::Finalized { booking_id }
            | FinalizeOutcome::Conflicted { booking_id, .. } => Some(booking_id),
            FinalizeOutcome::AlreadyProcessed => None,
        }
    }
}

/// Block membership when the confirmation doesn't carry it: the slots starting in
/// `[anchor, anchor + live_minutes)`, taken or not, else the anchor alone.
async fn derive_block(
    conn: &mut DbConnection,
    anchor: SlotId,
    live_minutes: i64,
) -> Result<Vec<SlotId>, BookingError> {
    let Some(start) = SqlSlotRepository::find_by_id_in(conn, anchor).await? else {
        return Ok(vec![anchor]);
    };
    let end = block_window_end(start.start_time, live_minutes.max(1))?;
    let ids: Vec<SlotId> = SqlSlotRepository::list_range_in(conn, start.start_time, end)
        .await?
        .iter()
        .map(|slot| slot.id)
        .collect();
    if ids.is_empty() {
        Ok(vec![anchor])
    } else {
        Ok(ids)
    }
}

/// Records a confirmed payment.
///
/// A duplicate event id is a normal outcome, not an error. Slots that can't be marked
/// never abort the transaction; the money has already moved, so the paid booking is
/// stored regardless and the conflict is reported.
pub async fn finalize(
    db: &DbClient,
    confirmation: &PaymentConfirmation,
    now: DateTime<Utc>,
) -> Result<FinalizeOutcome, BookingError> {
    let event_id = confirmation.event_id.as_str();
    let provider = confirmation.provider.as_str();

    let mut tx = db.begin_write().await?;

    if !SqlProcessedEventRepository::try_insert_in(&mut tx, event_id, provider, now).await? {
        tx.rollback().await?;
        info!(event_id, provider, "Payment event already processed");
        return Ok(FinalizeOutcome::AlreadyProcessed);
    }

    let block = if confirmation.block.is_empty() {
        derive_block(
            &mut tx,
            confirmation.anchor_slot_id,
            confirmation.meta.live_minutes,
        )
        .await?
    } else {
        confirmation.block.clone()
    };

    let marked = SqlSlotRepository::mark_taken_if_free_in(&mut tx, &block).await?;

    let meta = &confirmation.meta;
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        slot_id: confirmation.anchor_slot_id,
        session_type: meta.session_type.clone(),
        live_minutes: meta.live_minutes,
        block: block.clone(),
        status: BookingStatus::Paid,
        discord: meta.discord.clone(),
        in_game: meta.in_game,
        followups: meta.followups,
        notes: meta.notes.clone(),
        amount_cents: confirmation.amount_cents,
        currency: confirmation.currency.clone(),
        provider: Some(confirmation.provider),
        provider_ref: Some(confirmation.provider_ref.clone()),
        payer_email: confirmation.payer_email.clone(),
        created_at: now,
    };
    let stored = SqlBookingRepository::upsert_paid_in(&mut tx, &booking).await?;

    tx.commit().await?;

    let unavailable = block.len().saturating_sub(marked as usize);
    let booking_id = match stored {
        PaidUpsert::Recorded(booking_id) => booking_id,
        PaidUpsert::AlreadyPaid(booking_id) => {
            warn!(
                event_id,
                provider,
                anchor = confirmation.anchor_slot_id,
                booking_id = %booking_id,
                provider_ref = %confirmation.provider_ref,
                refund_ref = ?confirmation.refund_ref,
                amount_cents = ?confirmation.amount_cents,
                currency = ?confirmation.currency,
                "Second payment for an already paid booking; needs manual reconciliation"
            );
            return Ok(FinalizeOutcome::Conflicted {
                booking_id,
                unavailable,
            });
        }
    };

    if unavailable > 0 {
        warn!(
            event_id,
            provider,
            anchor = confirmation.anchor_slot_id,
            block = ?block,
            unavailable,
            provider_ref = %confirmation.provider_ref,
            "Paid block overlaps taken or missing slots; needs manual reconciliation"
        );
        return Ok(FinalizeOutcome::Conflicted {
            booking_id,
            unavailable,
        });
    }

    info!(
        event_id,
        provider,
        anchor = confirmation.anchor_slot_id,
        booking_id = %booking_id,
        "Payment finalized"
    );
    Ok(FinalizeOutcome::Finalized { booking_id })
}

/// [`finalize`], with a compensating refund when the transaction fails.
///
/// The refund runs detached: the caller gets the finalization error right away and a
/// failed refund is only logged.
pub async fn finalize_or_refund<S>(
    db: &DbClient,
    confirmation: &PaymentConfirmation,
    refunder: Arc<S>,
    now: DateTime<Utc>,
) -> Result<FinalizeOutcome, BookingError>
where
    S: PaymentService + 'static,
{
    match finalize(db, confirmation, now).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            error!(
                event_id = %confirmation.event_id,
                provider = %confirmation.provider,
                anchor = confirmation.anchor_slot_id,
                provider_ref = %confirmation.provider_ref,
                "Finalization failed after payment: {}", e
            );
            match confirmation.refund_ref.clone() {
                Some(target) => spawn_refund(refunder, target, confirmation.event_id.clone()),
                None => error!(
                    event_id = %confirmation.event_id,
                    "No refund target on confirmation; reconcile manually"
                ),
            }
            Err(e)
        }
    }
}

fn spawn_refund<S>(refunder: Arc<S>, target: String, event_id: String)
where
    S: PaymentService + 'static,
{
    tokio::spawn(async move {
        match refunder.create_refund(&target, None, None).await {
            Ok(refund) => info!(
                event_id = %event_id,
                refund_id = %refund.id,
                status = %refund.status,
                "Compensating refund issued"
            ),
            Err(e) => error!(
                event_id = %event_id,
                target = %target,
                "Compensating refund failed: {}", e
            ),
        }
    });
}
