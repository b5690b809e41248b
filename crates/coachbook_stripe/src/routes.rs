// --- File: crates/coachbook_stripe/src/routes.rs ---

use crate::handlers::{create_checkout_handler, stripe_webhook_handler, StripeState};
use crate::service::StripePaymentService;
use axum::{routing::post, Router};
use coachbook_config::AppConfig;
use coachbook_db::DbClient;
use std::sync::Arc;

/// Creates a router containing all routes for the Stripe feature.
pub fn routes(config: Arc<AppConfig>, db: DbClient) -> Router {
    let service = Arc::new(StripePaymentService::new(config.clone()));
    let stripe_state = Arc::new(StripeState {
        config,
        db,
        service,
    });

    Router::new()
        .route("/stripe/checkout", post(create_checkout_handler))
        .route("/stripe/webhook", post(stripe_webhook_handler))
        .with_state(stripe_state)
}
