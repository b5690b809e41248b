// --- File: crates/coachbook_booking/src/auth.rs ---

use crate::handlers::BookingState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use coachbook_common::error_response;
use coachbook_config::env_vars::secret;
use constant_time_eq::constant_time_eq;
use std::sync::Arc;
use tracing::{error, warn};

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Guards the admin routes with a shared key sent in `x-admin-key`.
///
/// The key comes from `admin.key` or, failing that, `ADMIN_KEY`. Without one every
/// admin request is refused with 500 so a misconfigured deployment stays closed.
pub async fn admin_auth_middleware(
    State(state): State<Arc<BookingState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = secret("admin.key", state.config.admin.key.as_deref()) else {
        error!("Admin key not configured; refusing admin request");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Admin access is not configured",
            "config",
        );
    };

    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => next.run(req).await,
        Some(_) => {
            warn!(path = %req.uri().path(), "Admin request with invalid key");
            error_response(StatusCode::UNAUTHORIZED, "Unauthorized", "unauthorized")
        }
        None => {
            warn!(path = %req.uri().path(), "Admin request without {} header", ADMIN_KEY_HEADER);
            error_response(StatusCode::UNAUTHORIZED, "Unauthorized", "unauthorized")
        }
    }
}
