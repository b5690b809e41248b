// --- File: crates/coachbook_stripe/src/doc.rs ---
#![cfg(feature = "openapi")]
use utoipa::OpenApi;

use crate::handlers::StripeCheckoutResponse;
use crate::logic::{
    StripeCheckoutSessionObject, StripeCustomerDetails, StripeEvent, StripeEventData,
};
use coachbook_booking::CheckoutRequest;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::create_checkout_handler,
        crate::handlers::stripe_webhook_handler,
    ),
    components(
        schemas(
            CheckoutRequest, StripeCheckoutResponse,
            StripeEvent, StripeEventData, StripeCheckoutSessionObject, StripeCustomerDetails,
        )
    ),
    tags(
        (name = "Stripe", description = "Stripe Checkout for held blocks"),
        (name = "Stripe Webhooks", description = "Stripe Server-to-Server Webhooks")
    )
)]
pub struct StripeApiDoc;
