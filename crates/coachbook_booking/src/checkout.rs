//! Provider-neutral half of checkout.
//!
//! [`prepare_checkout`] validates, resolves and holds the block inside one
//! transaction and prices it. The provider is only called after that transaction
//! has committed; no slot is marked taken here.

use crate::block::resolve_block;
use crate::error::BookingError;
use crate::hold::hold_block;
use crate::pricing::price_cents;
use chrono::{DateTime, Duration, Utc};
use coachbook_common::models::{BookingMeta, CheckoutPlan, CheckoutRedirect, SlotId};
use coachbook_common::services::PaymentService;
use coachbook_common::CoachbookError;
use coachbook_config::BookingConfig;
use coachbook_db::{DbClient, SqlSlotRepository};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_SESSION_TYPE_LEN: usize = 64;
pub const MAX_HANDLE_LEN: usize = 64;
pub const MAX_HOLD_KEY_LEN: usize = 64;

/// Body of a checkout request, shared by both payment providers.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[cfg_attr(feature = "openapi", schema(example = 42))]
    pub slot_id: SlotId,
    #[cfg_attr(feature = "openapi", schema(example = "VOD Review"))]
    pub session_type: String,
    #[cfg_attr(feature = "openapi", schema(example = 60))]
    pub live_minutes: i64,
    #[serde(default)]
    pub discord: Option<String>,
    #[serde(default)]
    pub in_game: Option<bool>,
    #[serde(default)]
    pub followups: Option<i64>,
    /// Key of a hold taken by an earlier attempt of the same buyer.
    #[serde(default)]
    pub hold_key: Option<String>,
}

/// Checks shape and bounds and turns the request into booking metadata.
pub fn validate_checkout(
    request: &CheckoutRequest,
    config: &BookingConfig,
) -> Result<BookingMeta, BookingError> {
    let session_type = request.session_type.trim();
    if session_type.is_empty() || session_type.chars().count() > MAX_SESSION_TYPE_LEN {
        return Err(BookingError::validation(format!(
            "sessionType must be 1-{} characters",
            MAX_SESSION_TYPE_LEN
        )));
    }
    if request.live_minutes < config.checkout_min_minutes
        || request.live_minutes > config.checkout_max_minutes
    {
        return Err(BookingError::validation(format!(
            "liveMinutes must be between {} and {}",
            config.checkout_min_minutes, config.checkout_max_minutes
        )));
    }
    let discord = request.discord.as_deref().unwrap_or("").trim().to_string();
    if discord.chars().count() > MAX_HANDLE_LEN {
        return Err(BookingError::validation(format!(
            "discord must be at most {} characters",
            MAX_HANDLE_LEN
        )));
    }
    let followups = request.followups.unwrap_or(0);
    if !(0..=config.max_followups).contains(&followups) {
        return Err(BookingError::validation(format!(
            "followups must be between 0 and {}",
            config.max_followups
        )));
    }
    if let Some(key) = &request.hold_key {
        if key.trim().is_empty() || key.len() > MAX_HOLD_KEY_LEN {
            return Err(BookingError::validation(format!(
                "holdKey must be 1-{} characters",
                MAX_HOLD_KEY_LEN
            )));
        }
    }

    Ok(BookingMeta {
        session_type: session_type.to_string(),
        live_minutes: request.live_minutes,
        discord,
        in_game: request.in_game.unwrap_or(false),
        followups,
        notes: None,
    })
}

/// Validates, resolves and holds the requested block and prices it.
///
/// A request without a hold key gets a fresh one, so it can never take over a live
/// hold of somebody else.
pub async fn prepare_checkout(
    db: &DbClient,
    config: &BookingConfig,
    request: &CheckoutRequest,
    now: DateTime<Utc>,
) -> Result<CheckoutPlan, BookingError> {
    let meta = validate_checkout(request, config)?;
    let hold_key = request
        .hold_key
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let ttl = Duration::minutes(config.hold_ttl_minutes);

    let mut tx = db.begin_write().await?;
    let block = resolve_block(
        &mut tx,
        request.slot_id,
        meta.live_minutes,
        config.slot_minutes,
    )
    .await?;
    let ids = block.ids();

    let hold_until = match hold_block(&mut tx, &ids, &hold_key, now, ttl).await {
        Ok(until) => until,
        Err(BookingError::HoldExpired) => {
            // Lapsed holds stay cleared so the same key can start over.
            tx.commit().await?;
            return Err(BookingError::HoldExpired);
        }
        Err(e) => return Err(e),
    };
    tx.commit().await?;

    let amount_cents = price_cents(meta.live_minutes, meta.followups);
    info!(
        slot_id = request.slot_id,
        block = ?ids,
        amount_cents,
        "Checkout prepared"
    );

    Ok(CheckoutPlan {
        anchor_slot_id: block.start.id,
        anchor_start: block.start.start_time,
        block: ids,
        meta,
        amount_cents,
        currency: config.currency.to_uppercase(),
        hold_key,
        hold_until,
    })
}

/// Drops the holds a plan placed. Used when the provider refuses the payment.
pub async fn release_plan_holds(db: &DbClient, plan: &CheckoutPlan) -> Result<u64, BookingError> {
    let mut conn = db.pool().acquire().await?;
    let released = SqlSlotRepository::release_holds_in(&mut conn, &plan.block, &plan.hold_key).await?;
    Ok(released)
}

/// Prepares the plan and hands it to `service`. Holds are released again when the
/// provider call fails.
pub async fn create_checkout<S>(
    db: &DbClient,
    config: &BookingConfig,
    request: &CheckoutRequest,
    service: &S,
    now: DateTime<Utc>,
) -> Result<CheckoutRedirect, CoachbookError>
where
    S: PaymentService,
    S::Error: Into<CoachbookError>,
{
    let plan = prepare_checkout(db, config, request, now).await?;

    match service.create_checkout(&plan).await {
        Ok(redirect) => {
            info!(
                provider = %redirect.provider,
                provider_ref = %redirect.provider_ref,
                slot_id = plan.anchor_slot_id,
                "Checkout created"
            );
            Ok(redirect)
        }
        Err(e) => {
            if let Err(release_err) = release_plan_holds(db, &plan).await {
                warn!(
                    slot_id = plan.anchor_slot_id,
                    "Could not release holds after provider failure: {}", release_err
                );
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            slot_id: 1,
            session_type: "VOD Review".to_string(),
            live_minutes: 60,
            discord: Some("  player#1234 ".to_string()),
            in_game: None,
            followups: None,
            hold_key: None,
        }
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let meta = validate_checkout(&request(), &BookingConfig::default()).unwrap();
        assert_eq!(meta.discord, "player#1234");
        assert!(!meta.in_game);
        assert_eq!(meta.followups, 0);
    }

    #[test]
    fn duration_bounds_are_enforced() {
        let config = BookingConfig::default();
        let mut req = request();
        req.live_minutes = 15;
        assert!(matches!(
            validate_checkout(&req, &config),
            Err(BookingError::Validation(_))
        ));
        req.live_minutes = 135;
        assert!(validate_checkout(&req, &config).is_err());
        req.live_minutes = 120;
        assert!(validate_checkout(&req, &config).is_ok());
    }

    #[test]
    fn handle_and_followups_are_bounded() {
        let config = BookingConfig::default();
        let mut req = request();
        req.discord = Some("x".repeat(65));
        assert!(validate_checkout(&req, &config).is_err());

        let mut req = request();
        req.followups = Some(5);
        assert!(validate_checkout(&req, &config).is_err());
        req.followups = Some(-1);
        assert!(validate_checkout(&req, &config).is_err());
    }

    #[test]
    fn blank_session_type_is_rejected() {
        let mut req = request();
        req.session_type = "   ".to_string();
        assert!(validate_checkout(&req, &BookingConfig::default()).is_err());
    }
}
