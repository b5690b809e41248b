// --- File: crates/coachbook_common/src/models.rs ---

//! Domain records shared by the storage layer, the booking core and the payment
//! provider adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an atomic slot.
pub type SlotId = i64;

/// One atomic, bookable quarter hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: SlotId,
    pub start_time: DateTime<Utc>,
    pub duration_min: i64,
    pub is_taken: bool,
    pub hold_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub hold_key: Option<String>,
}

impl Slot {
    /// A hold is live while its expiry lies in the future.
    pub fn has_live_hold(&self, now: DateTime<Utc>) -> bool {
        self.hold_until.map(|until| until > now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Paid,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "paid" => BookingStatus::Paid,
            _ => BookingStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Paypal,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Paypal => "paypal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stripe" => Some(PaymentProvider::Stripe),
            "paypal" => Some(PaymentProvider::Paypal),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase of a contiguous block, anchored on its first slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub slot_id: SlotId,
    pub session_type: String,
    pub live_minutes: i64,
    /// Every slot of the block, in start order.
    pub block: Vec<SlotId>,
    pub status: BookingStatus,
    pub discord: String,
    pub in_game: bool,
    pub followups: i64,
    pub notes: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub provider: Option<PaymentProvider>,
    pub provider_ref: Option<String>,
    pub payer_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What the buyer asked for, carried through the provider round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingMeta {
    pub session_type: String,
    pub live_minutes: i64,
    pub discord: String,
    pub in_game: bool,
    pub followups: i64,
    pub notes: Option<String>,
}

impl Default for BookingMeta {
    fn default() -> Self {
        Self {
            session_type: "Session".to_string(),
            live_minutes: 60,
            discord: String::new(),
            in_game: false,
            followups: 0,
            notes: None,
        }
    }
}

/// Everything a provider needs to open a payment for a resolved, priced block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutPlan {
    pub anchor_slot_id: SlotId,
    pub anchor_start: DateTime<Utc>,
    pub block: Vec<SlotId>,
    pub meta: BookingMeta,
    pub amount_cents: i64,
    /// ISO 4217, upper case.
    pub currency: String,
    pub hold_key: String,
    pub hold_until: DateTime<Utc>,
}

impl CheckoutPlan {
    /// Line item label, e.g. "VOD Review (60 min)".
    pub fn product_name(&self) -> String {
        format!("{} ({} min)", self.meta.session_type, self.meta.live_minutes)
    }

    pub fn block_csv(&self) -> String {
        join_ids(&self.block, ",")
    }
}

/// Where the buyer goes next to pay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRedirect {
    pub provider: PaymentProvider,
    /// Stripe session id or PayPal order id.
    pub provider_ref: String,
    pub redirect_url: Option<String>,
    pub hold_key: String,
}

/// A provider's confirmed payment, normalized so one finalization path serves
/// webhook pushes and capture responses alike.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfirmation {
    /// Idempotency key: Stripe event id, PayPal order id.
    pub event_id: String,
    pub provider: PaymentProvider,
    pub anchor_slot_id: SlotId,
    /// Explicit block membership. Empty means "derive from anchor and duration".
    pub block: Vec<SlotId>,
    pub meta: BookingMeta,
    pub amount_cents: Option<i64>,
    /// Lower case, as providers report it.
    pub currency: Option<String>,
    /// Stripe session id or PayPal order id.
    pub provider_ref: String,
    /// What a compensating refund has to target (payment intent, capture id).
    pub refund_ref: Option<String>,
    pub payer_email: Option<String>,
}

pub fn join_ids(ids: &[SlotId], sep: &str) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Parses a comma separated id list, skipping blanks and garbage.
pub fn parse_id_csv(csv: &str) -> Vec<SlotId> {
    csv.split(',')
        .filter_map(|part| part.trim().parse::<SlotId>().ok())
        .collect()
}
