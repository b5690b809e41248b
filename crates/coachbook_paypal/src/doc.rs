// --- File: crates/coachbook_paypal/src/doc.rs ---
#![cfg(feature = "openapi")]
use utoipa::OpenApi;

use crate::handlers::{CaptureRequest, CaptureResponse, CreateOrderResponse};
use coachbook_booking::CheckoutRequest;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::create_order_handler,
        crate::handlers::capture_handler,
    ),
    components(schemas(CheckoutRequest, CreateOrderResponse, CaptureRequest, CaptureResponse)),
    tags((name = "PayPal", description = "PayPal orders for held blocks"))
)]
pub struct PaypalApiDoc;
