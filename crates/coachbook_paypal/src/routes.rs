// --- File: crates/coachbook_paypal/src/routes.rs ---

use crate::handlers::{capture_handler, create_order_handler, PaypalState};
use crate::service::PaypalPaymentService;
use axum::{routing::post, Router};
use coachbook_config::AppConfig;
use coachbook_db::DbClient;
use std::sync::Arc;

/// Creates a router containing all routes for the PayPal feature.
pub fn routes(config: Arc<AppConfig>, db: DbClient) -> Router {
    let service = Arc::new(PaypalPaymentService::new(config.clone()));
    let paypal_state = Arc::new(PaypalState {
        config,
        db,
        service,
    });

    Router::new()
        .route("/paypal/create-order", post(create_order_handler))
        .route("/paypal/capture", post(capture_handler))
        .with_state(paypal_state)
}
