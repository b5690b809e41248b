// --- File: crates/coachbook_paypal/src/logic.rs ---
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use coachbook_booking::pricing::{format_amount, parse_amount};
use coachbook_booking::{finalize_or_refund, FinalizeOutcome};
use coachbook_common::models::{
    join_ids, BookingMeta, CheckoutPlan, PaymentConfirmation, PaymentProvider, SlotId,
};
use coachbook_common::services::{PaymentService, RefundResult};
use coachbook_common::{provider_error_message, HTTP_CLIENT};
use coachbook_config::env_vars::secret;
use coachbook_config::{PaypalConfig, SiteConfig};
use coachbook_db::DbClient;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::PaypalError;
use crate::service::PaypalPaymentService;

/// Lifetime assumed when the token response has no `expires_in`.
const DEFAULT_TOKEN_TTL_SECS: i64 = 3000;
/// Tokens are refreshed this long before PayPal would reject them.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 10;

// --- Data Structures ---

/// Order metadata carried through PayPal in `custom_id`.
///
/// Field names are single letters to stay within PayPal's 127 character limit.
/// The block itself is not carried; finalization derives it from anchor and
/// duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFields {
    /// Anchor slot
    pub a: SlotId,
    /// Live minutes
    pub m: i64,
    /// Session type
    pub t: String,
    /// Buyer handle
    #[serde(default)]
    pub d: String,
    /// In-game add-on
    #[serde(default)]
    pub g: bool,
    /// Follow-ups
    #[serde(default)]
    pub f: i64,
    /// Quoted amount in cents
    #[serde(default)]
    pub p: i64,
}

impl CustomFields {
    pub fn from_plan(plan: &CheckoutPlan) -> Self {
        Self {
            a: plan.anchor_slot_id,
            m: plan.meta.live_minutes,
            t: plan.meta.session_type.clone(),
            d: plan.meta.discord.clone(),
            g: plan.meta.in_game,
            f: plan.meta.followups,
            p: plan.amount_cents,
        }
    }

    pub fn meta(&self) -> BookingMeta {
        BookingMeta {
            session_type: if self.t.trim().is_empty() {
                BookingMeta::default().session_type
            } else {
                self.t.clone()
            },
            live_minutes: self.m,
            discord: self.d.clone(),
            in_game: self.g,
            followups: self.f,
            notes: None,
        }
    }
}

#[derive(Deserialize, Debug)]
struct PaypalTokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PaypalLink {
    pub href: String,
    pub rel: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PaypalOrderResponse {
    pub id: String,
    pub status: Option<String>,
    #[serde(default)]
    pub links: Vec<PaypalLink>,
}

impl PaypalOrderResponse {
    /// Where the buyer approves the order.
    pub fn approve_url(&self) -> Option<String> {
        self.links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.clone())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PaypalAmount {
    pub currency_code: String,
    pub value: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PaypalCapture {
    pub id: String,
    pub status: Option<String>,
    pub amount: Option<PaypalAmount>,
    pub custom_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PaypalPayments {
    #[serde(default)]
    pub captures: Vec<PaypalCapture>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PaypalPurchaseUnit {
    pub reference_id: Option<String>,
    pub custom_id: Option<String>,
    pub payments: Option<PaypalPayments>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PaypalPayer {
    pub email_address: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PaypalCaptureResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub purchase_units: Vec<PaypalPurchaseUnit>,
    pub payer: Option<PaypalPayer>,
}

impl PaypalCaptureResponse {
    fn first_capture(&self) -> Option<&PaypalCapture> {
        self.purchase_units
            .first()
            .and_then(|pu| pu.payments.as_ref())
            .and_then(|p| p.captures.first())
    }

    /// The custom field as set on the order, or as echoed on the capture.
    fn custom_id(&self) -> Option<&str> {
        self.purchase_units
            .first()
            .and_then(|pu| pu.custom_id.as_deref())
            .or_else(|| self.first_capture().and_then(|c| c.custom_id.as_deref()))
    }
}

#[derive(Deserialize, Debug)]
struct PaypalRefundResponse {
    id: String,
    status: Option<String>,
    amount: Option<PaypalAmount>,
}

// --- custom_id ---

/// Encodes the order metadata as unpadded base64url JSON.
///
/// Values longer than `limit` are refused rather than cut, since a truncated
/// value can't be decoded at capture time.
pub fn encode_custom_id(fields: &CustomFields, limit: usize) -> Result<String, PaypalError> {
    let json = serde_json::to_vec(fields)?;
    let encoded = URL_SAFE_NO_PAD.encode(json);
    if encoded.len() > limit {
        return Err(PaypalError::CustomIdTooLong {
            len: encoded.len(),
            limit,
        });
    }
    Ok(encoded)
}

/// Reads a custom field back. Accepts base64url and, for older orders, plain JSON.
pub fn decode_custom_id(custom_id: &str) -> Option<CustomFields> {
    let trimmed = custom_id.trim();
    URL_SAFE_NO_PAD
        .decode(trimmed.trim_end_matches('='))
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .or_else(|| serde_json::from_str(trimmed).ok())
}

// --- OAuth token cache ---

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// One token per API base and client id. Concurrent refreshes may both fetch; the
/// last writer wins, which is harmless since either token is valid.
static TOKEN_CACHE: Lazy<RwLock<HashMap<String, CachedToken>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn credentials(config: &PaypalConfig) -> Result<(String, String), PaypalError> {
    let client_id = secret("paypal.client_id", config.client_id.as_deref())
        .ok_or(PaypalError::ConfigError)?;
    let client_secret =
        secret("paypal.secret", config.secret.as_deref()).ok_or(PaypalError::ConfigError)?;
    Ok((client_id, client_secret))
}

fn cached_token(key: &str, now: DateTime<Utc>) -> Option<String> {
    let cache = TOKEN_CACHE.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    cache
        .get(key)
        .filter(|t| t.expires_at > now)
        .map(|t| t.token.clone())
}

/// Returns a bearer token, fetching a fresh one when the cached one is about to
/// expire.
pub async fn access_token(config: &PaypalConfig) -> Result<String, PaypalError> {
    let (client_id, client_secret) = credentials(config)?;
    let base = config.base_url();
    let cache_key = format!("{}|{}", base, client_id);
    if let Some(token) = cached_token(&cache_key, Utc::now()) {
        return Ok(token);
    }

    debug!("Requesting PayPal access token");
    let response = HTTP_CLIENT
        .post(format!("{}/v1/oauth2/token", base))
        .basic_auth(&client_id, Some(&client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;
    let status = response.status();
    let body_text = response.text().await?;
    if !status.is_success() {
        error!(status = status.as_u16(), "PayPal OAuth failed: {}", body_text);
        return Err(PaypalError::AuthError(provider_error_message(&body_text)));
    }

    let token: PaypalTokenResponse = serde_json::from_str(&body_text)?;
    let ttl = token.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
    let cached = CachedToken {
        token: token.access_token.clone(),
        expires_at: Utc::now() + Duration::seconds(ttl - TOKEN_EXPIRY_MARGIN_SECS),
    };
    TOKEN_CACHE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(cache_key, cached);
    Ok(token.access_token)
}

// --- Orders ---

/// Idempotency key for order creation: a retried checkout of the same block at the
/// same price maps to the same order.
pub fn request_id(plan: &CheckoutPlan) -> String {
    format!("{}:{}:paypal", join_ids(&plan.block, "|"), plan.amount_cents)
}

pub fn order_request_body(plan: &CheckoutPlan, custom_id: &str, site: &SiteConfig) -> serde_json::Value {
    json!({
        "intent": "CAPTURE",
        "purchase_units": [{
            "reference_id": plan.anchor_slot_id.to_string(),
            "custom_id": custom_id,
            "amount": {
                "currency_code": plan.currency.to_uppercase(),
                "value": format_amount(plan.amount_cents),
            },
            "description": format!("{} ({}m)", plan.meta.session_type, plan.meta.live_minutes),
        }],
        "application_context": {
            "brand_name": site.brand_name,
            "user_action": "PAY_NOW",
            "shipping_preference": "NO_SHIPPING",
            "return_url": site.success_url(),
            "cancel_url": site.cancel_url(),
        }
    })
}

async fn api_error(response: reqwest::Response, what: &str) -> PaypalError {
    let status = response.status();
    let body_text = response.text().await.unwrap_or_default();
    error!(status = status.as_u16(), "PayPal {} failed: {}", what, body_text);
    PaypalError::ApiError {
        status_code: status.as_u16(),
        message: provider_error_message(&body_text),
    }
}

/// Creates a PayPal order for a held, priced block.
pub async fn create_order(
    config: &PaypalConfig,
    site: &SiteConfig,
    plan: &CheckoutPlan,
) -> Result<PaypalOrderResponse, PaypalError> {
    // Checked before any network traffic, the token request included.
    let custom_id = encode_custom_id(&CustomFields::from_plan(plan), config.custom_id_limit)?;
    let token = access_token(config).await?;
    let body = order_request_body(plan, &custom_id, site);

    info!(
        slot_id = plan.anchor_slot_id,
        amount_cents = plan.amount_cents,
        "Creating PayPal order"
    );
    let response = HTTP_CLIENT
        .post(format!("{}/v2/checkout/orders", config.base_url()))
        .bearer_auth(token)
        .header("Prefer", "return=representation")
        .header("PayPal-Request-Id", request_id(plan))
        .json(&body)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(api_error(response, "order creation").await);
    }
    let order: PaypalOrderResponse = serde_json::from_str(&response.text().await?)?;
    debug!(order_id = %order.id, status = ?order.status, "PayPal order created");
    Ok(order)
}

/// Captures an approved order.
pub async fn capture_order(
    config: &PaypalConfig,
    order_id: &str,
) -> Result<PaypalCaptureResponse, PaypalError> {
    let token = access_token(config).await?;
    let response = HTTP_CLIENT
        .post(format!(
            "{}/v2/checkout/orders/{}/capture",
            config.base_url(),
            order_id
        ))
        .bearer_auth(token)
        .header("Prefer", "return=representation")
        .json(&json!({}))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(api_error(response, "capture").await);
    }
    Ok(serde_json::from_str(&response.text().await?)?)
}

/// Refunds a capture. `None` amount refunds in full.
pub async fn refund_capture(
    config: &PaypalConfig,
    capture_id: &str,
    amount: Option<(i64, &str)>,
    reason: Option<&str>,
) -> Result<RefundResult, PaypalError> {
    let token = access_token(config).await?;
    let mut body = json!({});
    if let Some((cents, currency)) = amount {
        body["amount"] = json!({
            "value": format_amount(cents),
            "currency_code": currency.to_uppercase(),
        });
    }
    if let Some(reason) = reason {
        body["note_to_payer"] = json!(reason);
    }

    let response = HTTP_CLIENT
        .post(format!(
            "{}/v2/payments/captures/{}/refund",
            config.base_url(),
            capture_id
        ))
        .bearer_auth(token)
        .header("Prefer", "return=representation")
        .json(&body)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(api_error(response, "refund").await);
    }
    let refund: PaypalRefundResponse = serde_json::from_str(&response.text().await?)?;
    Ok(RefundResult {
        id: refund.id,
        status: refund.status.unwrap_or_else(|| "unknown".to_string()),
        amount: refund.amount.as_ref().and_then(|a| parse_amount(&a.value)),
        currency: refund.amount.map(|a| a.currency_code.to_lowercase()),
    })
}

// --- Capture normalization ---

/// Turns a capture response into a [`PaymentConfirmation`]. The order id is the
/// idempotency key; the capture id is what a refund has to target.
pub fn confirmation_from_capture(
    order_id: &str,
    capture: &PaypalCaptureResponse,
) -> Result<PaymentConfirmation, PaypalError> {
    if capture.status != "COMPLETED" {
        return Err(PaypalError::NotCompleted(capture.status.clone()));
    }
    let fields = capture
        .custom_id()
        .and_then(decode_custom_id)
        .ok_or(PaypalError::MissingCustomId)?;
    let captured = capture.first_capture();
    let amount = captured.and_then(|c| c.amount.as_ref());

    Ok(PaymentConfirmation {
        event_id: order_id.to_string(),
        provider: PaymentProvider::Paypal,
        anchor_slot_id: fields.a,
        block: Vec::new(),
        meta: fields.meta(),
        amount_cents: amount.and_then(|a| parse_amount(&a.value)),
        currency: Some(
            amount
                .map(|a| a.currency_code.to_lowercase())
                .unwrap_or_else(|| "eur".to_string()),
        ),
        provider_ref: order_id.to_string(),
        refund_ref: captured.map(|c| c.id.clone()),
        payer_email: capture.payer.as_ref().and_then(|p| p.email_address.clone()),
    })
}

/// Captures `order_id` and records the booking.
///
/// A completed capture whose custom field can't be read is refunded right away:
/// the money moved but there is no slot to book.
pub async fn capture_and_finalize(
    db: &DbClient,
    service: Arc<PaypalPaymentService>,
    config: &PaypalConfig,
    order_id: &str,
    now: DateTime<Utc>,
) -> Result<FinalizeOutcome, PaypalError> {
    let capture = capture_order(config, order_id).await?;
    let confirmation = match confirmation_from_capture(order_id, &capture) {
        Ok(confirmation) => confirmation,
        Err(PaypalError::MissingCustomId) => {
            error!(order_id, "Captured PayPal order without readable custom_id");
            if let Some(captured) = capture.first_capture() {
                match service.create_refund(&captured.id, None, None).await {
                    Ok(refund) => {
                        warn!(order_id, refund_id = %refund.id, "Refunded unidentifiable capture")
                    }
                    Err(e) => error!(order_id, "Refund of unidentifiable capture failed: {}", e),
                }
            }
            return Err(PaypalError::MissingCustomId);
        }
        Err(e) => return Err(e),
    };

    let outcome = finalize_or_refund(db, &confirmation, service, now).await?;
    info!(
        order_id,
        outcome = outcome.as_str(),
        "PayPal capture processed"
    );
    Ok(outcome)
}
