// --- File: crates/coachbook_booking/src/routes.rs ---

use crate::auth::admin_auth_middleware;
use crate::handlers::{
    admin_bookings_handler, admin_bulk_handler, admin_generate_handler,
    create_booking_handler, get_availability_handler, get_slots_handler, health_handler,
    ics_handler, price_handler, BookingState,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use coachbook_config::AppConfig;
use coachbook_db::DbClient;
use std::sync::Arc;

/// Public booking routes plus the admin routes behind the admin-key check.
pub fn routes(config: Arc<AppConfig>, db: DbClient) -> Router {
    let state = Arc::new(BookingState { config, db });

    let admin = Router::new()
        .route("/admin/slots/generate", post(admin_generate_handler))
        .route("/admin/slots/bulk", post(admin_bulk_handler))
        .route("/admin/bookings", get(admin_bookings_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    Router::new()
        .route("/slots", get(get_slots_handler))
        .route("/availability", get(get_availability_handler))
        .route("/price", get(price_handler))
        .route("/bookings", post(create_booking_handler))
        .route("/ics", get(ics_handler))
        .route("/health", get(health_handler))
        .merge(admin)
        .with_state(state)
}
