// --- File: crates/coachbook_stripe/src/logic.rs ---
use coachbook_booking::{finalize_or_refund, FinalizeOutcome};
use coachbook_common::models::{
    BookingMeta, CheckoutPlan, PaymentConfirmation, PaymentProvider, SlotId,
};
use coachbook_common::services::{PaymentService, RefundResult};
use coachbook_common::{parse_id_csv, provider_error_message, HTTP_CLIENT};
use coachbook_config::env_vars::secret;
use coachbook_config::{SiteConfig, StripeConfig};
use coachbook_db::DbClient;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::StripeError;
use crate::service::StripePaymentService;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Header Stripe signs webhook deliveries with.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

// --- Data Structures ---

#[derive(Deserialize, Debug)]
struct StripeCheckoutSessionApiResponse {
    pub id: String,
    pub url: Option<String>,
}

/// A created checkout session.
#[derive(Serialize, Debug, Clone)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionResponse {
    #[cfg_attr(
        feature = "openapi",
        schema(example = "https://checkout.stripe.com/pay/cs_test_a1...")
    )]
    pub url: String,
    #[cfg_attr(feature = "openapi", schema(example = "cs_test_a1..."))]
    pub session_id: String,
}

/// Represents the `data` field within a Stripe Event.
#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StripeEventData {
    /// Shape depends on the event type.
    pub object: serde_json::Value,
}

/// Represents the outer Stripe Event object.
#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StripeEvent {
    pub id: String,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub livemode: bool,
    #[serde(rename = "type")]
    pub event_type: String, // e.g., "checkout.session.completed"
    pub data: StripeEventData,
}

/// The fields of a checkout session that matter for finalization.
#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StripeCheckoutSessionObject {
    pub id: String,                // Checkout Session ID (cs_...)
    pub amount_total: Option<i64>, // Total amount in cents
    pub currency: Option<String>,
    pub customer_details: Option<StripeCustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub payment_intent: Option<String>, // Payment Intent ID (pi_...)
    pub payment_status: Option<String>, // e.g., "paid", "unpaid", "no_payment_required"
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StripeCustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StripeRefundApiResponse {
    id: String,
    status: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
}

// --- Credentials ---

pub fn secret_key(config: &StripeConfig) -> Result<String, StripeError> {
    secret("stripe.secret_key", config.secret_key.as_deref()).ok_or(StripeError::ConfigError)
}

pub fn webhook_secret(config: &StripeConfig) -> Result<String, StripeError> {
    secret("stripe.webhook_secret", config.webhook_secret.as_deref())
        .ok_or(StripeError::ConfigError)
}

fn api_url(config: &StripeConfig, path: &str) -> String {
    format!("{}{}", config.api_base.trim_end_matches('/'), path)
}

// --- Checkout Session ---

/// Redirect targets for a session. The success URL carries Stripe's session
/// placeholder so the landing page can look the session up.
pub fn redirect_urls(config: &StripeConfig, site: &SiteConfig) -> (String, String) {
    let success = config
        .success_url
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| format!("{}?session_id={{CHECKOUT_SESSION_ID}}", site.success_url()));
    let cancel = config
        .cancel_url
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| site.cancel_url());
    (success, cancel)
}

/// Form body of `POST /v1/checkout/sessions` for a prepared plan.
pub fn checkout_session_form(
    plan: &CheckoutPlan,
    success_url: &str,
    cancel_url: &str,
) -> Vec<(String, String)> {
    let meta = &plan.meta;
    vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[]".to_string(), "card".to_string()),
        ("success_url".to_string(), success_url.to_string()),
        ("cancel_url".to_string(), cancel_url.to_string()),
        (
            "line_items[0][price_data][currency]".to_string(),
            plan.currency.to_lowercase(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            plan.product_name(),
        ),
        (
            "line_items[0][price_data][product_data][description]".to_string(),
            format!("Time: {}", plan.anchor_start.to_rfc3339()),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            plan.amount_cents.to_string(),
        ),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        (
            "metadata[slotId]".to_string(),
            plan.anchor_slot_id.to_string(),
        ),
        ("metadata[slotIds]".to_string(), plan.block_csv()),
        ("metadata[sessionType]".to_string(), meta.session_type.clone()),
        (
            "metadata[liveMinutes]".to_string(),
            meta.live_minutes.to_string(),
        ),
        ("metadata[discord]".to_string(), meta.discord.clone()),
        ("metadata[inGame]".to_string(), meta.in_game.to_string()),
        ("metadata[followups]".to_string(), meta.followups.to_string()),
        ("metadata[holdKey]".to_string(), plan.hold_key.clone()),
    ]
}

/// Creates a Stripe Checkout Session for a held, priced block.
pub async fn create_checkout_session(
    stripe_config: &StripeConfig,
    site: &SiteConfig,
    plan: &CheckoutPlan,
) -> Result<CreateCheckoutSessionResponse, StripeError> {
    let stripe_secret_key = secret_key(stripe_config)?;
    let (success_url, cancel_url) = redirect_urls(stripe_config, site);
    let form_body = checkout_session_form(plan, &success_url, &cancel_url);
    let url = api_url(stripe_config, "/v1/checkout/sessions");

    info!(
        slot_id = plan.anchor_slot_id,
        amount_cents = plan.amount_cents,
        "Creating Stripe checkout session"
    );

    let response = HTTP_CLIENT
        .post(&url)
        .basic_auth(stripe_secret_key, None::<&str>)
        .form(&form_body)
        .send()
        .await?;

    let status = response.status();
    let body_text = response.text().await?;

    if !status.is_success() {
        let message = provider_error_message(&body_text);
        error!(
            status = status.as_u16(),
            "Stripe rejected checkout session: {}", body_text
        );
        return Err(StripeError::ApiError {
            status_code: status.as_u16(),
            message,
        });
    }

    let session: StripeCheckoutSessionApiResponse = serde_json::from_str(&body_text)?;
    match session.url {
        Some(url) => {
            debug!(session_id = %session.id, "Stripe checkout session created");
            Ok(CreateCheckoutSessionResponse {
                url,
                session_id: session.id,
            })
        }
        None => {
            warn!(session_id = %session.id, "Stripe response missing checkout URL");
            Err(StripeError::InternalError(
                "Stripe response missing checkout URL".to_string(),
            ))
        }
    }
}

// --- Refunds ---

/// Refunds a payment intent. `None` amount refunds in full.
pub async fn create_refund(
    stripe_config: &StripeConfig,
    payment_intent: &str,
    amount: Option<i64>,
    reason: Option<&str>,
) -> Result<RefundResult, StripeError> {
    let stripe_secret_key = secret_key(stripe_config)?;
    let mut form_body = vec![("payment_intent".to_string(), payment_intent.to_string())];
    if let Some(amount) = amount {
        form_body.push(("amount".to_string(), amount.to_string()));
    }
    if let Some(reason) = reason {
        form_body.push(("reason".to_string(), reason.to_string()));
    }

    let response = HTTP_CLIENT
        .post(api_url(stripe_config, "/v1/refunds"))
        .basic_auth(stripe_secret_key, None::<&str>)
        .form(&form_body)
        .send()
        .await?;

    let status = response.status();
    let body_text = response.text().await?;
    if !status.is_success() {
        error!(
            status = status.as_u16(),
            payment_intent, "Stripe refund failed: {}", body_text
        );
        return Err(StripeError::ApiError {
            status_code: status.as_u16(),
            message: provider_error_message(&body_text),
        });
    }

    let refund: StripeRefundApiResponse = serde_json::from_str(&body_text)?;
    Ok(RefundResult {
        id: refund.id,
        status: refund.status.unwrap_or_else(|| "unknown".to_string()),
        amount: refund.amount,
        currency: refund.currency,
    })
}

// --- Webhook Processing Logic ---

/// Verifies the `Stripe-Signature` header of a webhook delivery.
///
/// The header carries `t=<unix ts>` and one or more `v1=<hex hmac>` entries; the
/// HMAC-SHA256 of `"{t}.{payload}"` under `secret` must match one of them, and `t`
/// must lie within `tolerance_secs` of `now_ts`.
pub fn verify_stripe_signature(
    payload_bytes: &[u8],
    sig_header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now_ts: i64,
) -> Result<(), StripeError> {
    let sig_header_value = sig_header.ok_or_else(|| {
        StripeError::WebhookSignatureError("Missing Stripe-Signature header".to_string())
    })?;

    let mut timestamp_str: Option<&str> = None;
    let mut v1_signatures_hex: Vec<&str> = Vec::new();
    for item in sig_header_value.split(',') {
        if let Some((key, value)) = item.trim().split_once('=') {
            match key {
                "t" => timestamp_str = Some(value),
                "v1" => v1_signatures_hex.push(value),
                _ => {} // v0 and future schemes
            }
        }
    }

    let timestamp_str = timestamp_str.ok_or_else(|| {
        StripeError::WebhookSignatureError("Missing timestamp 't' in Stripe-Signature".to_string())
    })?;
    let parsed_timestamp = timestamp_str.parse::<i64>().map_err(|_| {
        StripeError::WebhookSignatureError(
            "Invalid timestamp format in Stripe-Signature".to_string(),
        )
    })?;
    if v1_signatures_hex.is_empty() {
        return Err(StripeError::WebhookSignatureError(
            "Missing v1 signature in Stripe-Signature".to_string(),
        ));
    }

    if (now_ts - parsed_timestamp).abs() > tolerance_secs {
        warn!(
            event_ts = parsed_timestamp,
            now_ts, "Stripe webhook timestamp outside tolerance"
        );
        return Err(StripeError::WebhookSignatureError(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
        StripeError::WebhookSignatureError("Invalid webhook secret format for HMAC".to_string())
    })?;
    mac.update(timestamp_str.as_bytes());
    mac.update(b".");
    mac.update(payload_bytes);
    let calculated_signature_hex = hex::encode(mac.finalize().into_bytes());

    if v1_signatures_hex.iter().any(|provided| {
        constant_time_eq::constant_time_eq(calculated_signature_hex.as_bytes(), provided.as_bytes())
    }) {
        return Ok(());
    }
    Err(StripeError::WebhookSignatureError(
        "Signature mismatch".to_string(),
    ))
}

/// Normalizes a completed checkout session into a [`PaymentConfirmation`].
///
/// Returns `None` for sessions that are not paid yet.
pub fn confirmation_from_session(
    event_id: &str,
    session: &StripeCheckoutSessionObject,
) -> Result<Option<PaymentConfirmation>, StripeError> {
    if session.payment_status.as_deref() == Some("unpaid") {
        info!(
            session_id = %session.id,
            "Checkout session completed without payment; nothing to finalize"
        );
        return Ok(None);
    }

    let metadata = &session.metadata;
    let block: Vec<SlotId> = metadata
        .get("slotIds")
        .map(|csv| parse_id_csv(csv))
        .unwrap_or_default();
    let anchor_slot_id = metadata
        .get("slotId")
        .and_then(|id| id.trim().parse::<SlotId>().ok())
        .or_else(|| block.first().copied())
        .ok_or_else(|| StripeError::MissingSlotId(session.id.clone()))?;

    let defaults = BookingMeta::default();
    let meta = BookingMeta {
        session_type: metadata
            .get("sessionType")
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or(defaults.session_type),
        live_minutes: metadata
            .get("liveMinutes")
            .and_then(|m| m.trim().parse().ok())
            .unwrap_or(defaults.live_minutes),
        discord: metadata.get("discord").cloned().unwrap_or_default(),
        in_game: metadata.get("inGame").map(|v| v == "true").unwrap_or(false),
        followups: metadata
            .get("followups")
            .and_then(|f| f.trim().parse().ok())
            .unwrap_or(defaults.followups),
        notes: None,
    };

    Ok(Some(PaymentConfirmation {
        event_id: event_id.to_string(),
        provider: PaymentProvider::Stripe,
        anchor_slot_id,
        block,
        meta,
        amount_cents: session.amount_total,
        currency: session.currency.as_ref().map(|c| c.to_lowercase()),
        provider_ref: session.id.clone(),
        refund_ref: session.payment_intent.clone(),
        payer_email: session
            .customer_details
            .as_ref()
            .and_then(|d| d.email.clone()),
    }))
}

/// The money moved but there is no slot to book, so give it back.
async fn refund_unidentifiable_payment(
    refunder: &StripePaymentService,
    session: &StripeCheckoutSessionObject,
) {
    let Some(payment_intent) = session.payment_intent.as_deref() else {
        error!(session_id = %session.id, "No payment intent to refund; reconcile manually");
        return;
    };
    match refunder.create_refund(payment_intent, None, None).await {
        Ok(refund) => warn!(
            session_id = %session.id,
            refund_id = %refund.id,
            "Refunded checkout session without slot id"
        ),
        Err(e) => error!(
            session_id = %session.id,
            payment_intent,
            "Refund of checkout session without slot id failed: {}", e
        ),
    }
}

/// Processes a verified Stripe webhook event.
///
/// Only `checkout.session.completed` moves anything; other event types are
/// acknowledged and ignored.
pub async fn process_stripe_webhook(
    event: StripeEvent,
    db: &DbClient,
    refunder: Arc<StripePaymentService>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Option<FinalizeOutcome>, StripeError> {
    if event.event_type != CHECKOUT_COMPLETED {
        debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring Stripe event");
        return Ok(None);
    }

    let session: StripeCheckoutSessionObject = serde_json::from_value(event.data.object)
        .map_err(|e| {
            StripeError::WebhookProcessingError(format!(
                "Failed to parse checkout session object: {}",
                e
            ))
        })?;

    let confirmation = match confirmation_from_session(&event.id, &session) {
        Ok(Some(confirmation)) => confirmation,
        Ok(None) => return Ok(None),
        Err(e @ StripeError::MissingSlotId(_)) => {
            error!(event_id = %event.id, session_id = %session.id, "{}", e);
            refund_unidentifiable_payment(&refunder, &session).await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    let outcome = finalize_or_refund(db, &confirmation, refunder, now).await?;
    info!(
        event_id = %event.id,
        session_id = %session.id,
        outcome = outcome.as_str(),
        "Stripe checkout processed"
    );
    Ok(Some(outcome))
}
