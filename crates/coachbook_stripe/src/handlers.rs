// --- File: crates/coachbook_stripe/src/handlers.rs ---
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use coachbook_booking::{create_checkout, CheckoutRequest};
use coachbook_common::{error_response, CoachbookError};
use coachbook_config::AppConfig;
use coachbook_db::DbClient;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::logic::{
    process_stripe_webhook, verify_stripe_signature, webhook_secret, StripeEvent,
    SIGNATURE_HEADER,
};
use crate::service::StripePaymentService;

// --- State for Stripe Handlers ---
#[derive(Clone)]
pub struct StripeState {
    pub config: Arc<AppConfig>,
    pub db: DbClient,
    pub service: Arc<StripePaymentService>,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct StripeCheckoutResponse {
    #[cfg_attr(
        feature = "openapi",
        schema(example = "https://checkout.stripe.com/pay/cs_test_a1...")
    )]
    pub url: String,
    pub session_id: String,
    /// Send this back on a retry to resume the same hold.
    pub hold_key: String,
}

fn disabled() -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "Stripe service is disabled",
        "disabled",
    )
}

/// Holds the requested block and opens a Stripe Checkout Session for it.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/stripe/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Stripe Checkout Session created", body = StripeCheckoutResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Block unavailable, held by another checkout, or hold expired"),
        (status = 502, description = "Stripe API error"),
        (status = 503, description = "Stripe disabled")
    ),
    tag = "Stripe"
))]
pub async fn create_checkout_handler(
    State(state): State<Arc<StripeState>>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<StripeCheckoutResponse>, Response> {
    if !state.config.use_stripe {
        return Err(disabled());
    }

    let redirect = create_checkout(
        &state.db,
        &state.config.booking,
        &payload,
        state.service.as_ref(),
        Utc::now(),
    )
    .await
    .map_err(CoachbookError::into_response)?;

    Ok(Json(StripeCheckoutResponse {
        url: redirect.redirect_url.unwrap_or_default(),
        session_id: redirect.provider_ref,
        hold_key: redirect.hold_key,
    }))
}

/// Receives Stripe's server-to-server notifications.
///
/// Anything past signature verification is acknowledged with 200 so Stripe stops
/// retrying; failures after payment are compensated by a refund, not a retry.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/stripe/webhook",
    request_body(content = String, description = "Raw Stripe event JSON", content_type = "application/json"),
    params(("Stripe-Signature" = String, Header, description = "t=<timestamp>,v1=<hmac>")),
    responses(
        (status = 200, description = "Webhook received and acknowledged"),
        (status = 400, description = "Invalid signature or payload"),
        (status = 500, description = "Webhook secret not configured"),
        (status = 503, description = "Stripe disabled")
    ),
    tag = "Stripe Webhooks"
))]
pub async fn stripe_webhook_handler(
    State(state): State<Arc<StripeState>>,
    headers: HeaderMap,
    body: String, // Raw body for signature verification
) -> Response {
    if !state.config.use_stripe {
        return disabled();
    }
    let Some(stripe_config) = state.config.stripe.as_ref() else {
        error!("Stripe webhook received but Stripe is not configured");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Stripe configuration not loaded",
            "config",
        );
    };
    let secret = match webhook_secret(stripe_config) {
        Ok(secret) => secret,
        Err(_) => {
            error!("Stripe webhook secret is not configured");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Stripe webhook secret not configured",
                "config",
            );
        }
    };

    let sig_header = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok());
    let now = Utc::now();
    if let Err(e) = verify_stripe_signature(
        body.as_bytes(),
        sig_header,
        &secret,
        stripe_config.webhook_tolerance_secs,
        now.timestamp(),
    ) {
        warn!("Stripe webhook signature verification failed: {}", e);
        return (StatusCode::BAD_REQUEST, "Invalid signature").into_response();
    }

    let event: StripeEvent = match serde_json::from_str(&body) {
        Ok(ev) => ev,
        Err(e) => {
            warn!("Failed to deserialize Stripe webhook event: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid payload format").into_response();
        }
    };

    let event_id = event.id.clone();
    match process_stripe_webhook(event, &state.db, state.service.clone(), now).await {
        Ok(Some(outcome)) => info!(event_id = %event_id, outcome = outcome.as_str(), "Stripe webhook handled"),
        Ok(None) => {}
        Err(e) => error!(event_id = %event_id, "Error processing Stripe webhook: {}", e),
    }
    (StatusCode::OK, "ok").into_response()
}
