// --- File: crates/coachbook_paypal/src/handlers.rs ---
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use coachbook_booking::{create_checkout, CheckoutRequest, FinalizeOutcome};
use coachbook_common::{error_response, CoachbookError, HttpStatusCode};
use coachbook_config::AppConfig;
use coachbook_db::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::error::PaypalError;
use crate::logic::capture_and_finalize;
use crate::service::PaypalPaymentService;

#[derive(Clone)]
pub struct PaypalState {
    pub config: Arc<AppConfig>,
    pub db: DbClient,
    pub service: Arc<PaypalPaymentService>,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    #[cfg_attr(feature = "openapi", schema(example = "5O190127TN364715T"))]
    pub id: String,
    pub approve_url: Option<String>,
    /// Send this back on a retry to resume the same hold.
    pub hold_key: String,
}

#[derive(Deserialize, Debug)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub order_id: String,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    /// False when the payment was recorded on a block someone else already took.
    pub ok: bool,
    #[cfg_attr(feature = "openapi", schema(example = "finalized"))]
    pub outcome: String,
    pub booking_id: Option<String>,
}

impl From<FinalizeOutcome> for CaptureResponse {
    fn from(outcome: FinalizeOutcome) -> Self {
        Self {
            ok: !matches!(outcome, FinalizeOutcome::Conflicted { .. }),
            outcome: outcome.as_str().to_string(),
            booking_id: outcome.booking_id().map(str::to_string),
        }
    }
}

fn disabled() -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "PayPal service is disabled",
        "disabled",
    )
}

/// Renders PayPal errors, keeping the provider-specific kinds.
fn paypal_error_response(err: PaypalError) -> Response {
    match err.kind() {
        Some(kind) => {
            let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
            error_response(status, &err.to_string(), kind)
        }
        None => CoachbookError::from(err).into_response(),
    }
}

/// Holds the requested block and opens a PayPal order for it.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/paypal/create-order",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "PayPal order created", body = CreateOrderResponse),
        (status = 400, description = "Invalid request or metadata too long for PayPal"),
        (status = 409, description = "Block unavailable, held by another checkout, or hold expired"),
        (status = 502, description = "PayPal API error"),
        (status = 503, description = "PayPal disabled")
    ),
    tag = "PayPal"
))]
pub async fn create_order_handler(
    State(state): State<Arc<PaypalState>>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CreateOrderResponse>, Response> {
    if !state.config.use_paypal {
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

    Ok(Json(CreateOrderResponse {
        id: redirect.provider_ref,
        approve_url: redirect.redirect_url,
        hold_key: redirect.hold_key,
    }))
}

/// Captures an approved order and books the block.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/paypal/capture",
    request_body = CaptureRequest,
    responses(
        (status = 200, description = "Order captured and booking recorded", body = CaptureResponse),
        (status = 400, description = "Missing order id or order not completed"),
        (status = 500, description = "Booking could not be recorded; the capture is refunded"),
        (status = 502, description = "PayPal API error"),
        (status = 503, description = "PayPal disabled")
    ),
    tag = "PayPal"
))]
pub async fn capture_handler(
    State(state): State<Arc<PaypalState>>,
    Json(payload): Json<CaptureRequest>,
) -> Result<Json<CaptureResponse>, Response> {
    if !state.config.use_paypal {
        return Err(disabled());
    }
    let order_id = payload.order_id.trim();
    if order_id.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "orderId required",
            "validation",
        ));
    }
    let paypal_config = state.service.paypal_config().map_err(paypal_error_response)?;

    match capture_and_finalize(&state.db, state.service.clone(), paypal_config, order_id, Utc::now()).await {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(e) => {
            warn!(order_id, "PayPal capture failed: {}", e);
            Err(paypal_error_response(e))
        }
    }
}
