// --- File: crates/coachbook_booking/src/handlers.rs ---
use crate::admin::{
    bulk_update, generate_slots, BulkRequest, BulkResponse, GenerateSlotsRequest,
    GenerateSlotsResponse,
};
use crate::availability::{list_available_starts, AvailabilityQuery, AvailableStart};
use crate::direct::{create_direct_booking, DirectBookingRequest};
use crate::error::BookingError;
use crate::ics::{render_invite, Invite, InviteQuery};
use crate::pricing::{quote_for, PriceQuery, PriceQuote};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Duration, Utc};
use coachbook_common::models::{Booking, Slot};
use coachbook_common::CoachbookError;
use coachbook_config::AppConfig;
use coachbook_db::{BookingRepository, DbClient, SlotRepository, SqlBookingRepository, SqlSlotRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared state of the booking routes.
#[derive(Clone)]
pub struct BookingState {
    pub config: Arc<AppConfig>,
    pub db: DbClient,
}

/// Time window for listings; defaults to now and seven days after `from`.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl RangeQuery {
    fn resolve(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), BookingError> {
        let from = self.from.unwrap_or(now);
        let to = match self.to {
            Some(to) => to,
            None => from
                .checked_add_signed(Duration::days(7))
                .ok_or_else(|| BookingError::validation("'from' is out of range"))?,
        };
        if to <= from {
            return Err(BookingError::validation("'to' must be after 'from'"));
        }
        Ok((from, to))
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
}

/// Raw slots in a window, ascending by start.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/slots",
    params(RangeQuery),
    responses(
        (status = 200, description = "Slots in the window", body = [Slot]),
        (status = 400, description = "Invalid window")
    ),
    tag = "Booking"
))]
pub async fn get_slots_handler(
    State(state): State<Arc<BookingState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<Slot>>, CoachbookError> {
    let (from, to) = query.resolve(Utc::now())?;
    let slots = SqlSlotRepository::new(state.db.clone())
        .list_range(from, to)
        .await?;
    Ok(Json(slots))
}

/// Start slots that can carry a block of the requested length right now.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/availability",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Bookable starts", body = [AvailableStart]),
        (status = 400, description = "Invalid query")
    ),
    tag = "Booking"
))]
pub async fn get_availability_handler(
    State(state): State<Arc<BookingState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<AvailableStart>>, CoachbookError> {
    let starts = list_available_starts(&state.db, &state.config, &query, Utc::now()).await?;
    Ok(Json(starts))
}

/// Server-side price of a session; checkout charges exactly this amount.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/price",
    params(PriceQuery),
    responses(
        (status = 200, description = "Price quote", body = PriceQuote),
        (status = 400, description = "Length or follow-ups out of range")
    ),
    tag = "Booking"
))]
pub async fn price_handler(
    State(state): State<Arc<BookingState>>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<PriceQuote>, CoachbookError> {
    Ok(Json(quote_for(&query, &state.config.booking)?))
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/bookings",
    request_body = DirectBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = Booking),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Block unavailable")
    ),
    tag = "Booking"
))]
pub async fn create_booking_handler(
    State(state): State<Arc<BookingState>>,
    Json(request): Json<DirectBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), CoachbookError> {
    let booking =
        create_direct_booking(&state.db, &state.config.booking, &request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Calendar invite for a session.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/ics",
    params(InviteQuery),
    responses(
        (status = 200, description = "iCalendar file", content_type = "text/calendar"),
        (status = 400, description = "Invalid query")
    ),
    tag = "Booking"
))]
pub async fn ics_handler(Query(query): Query<InviteQuery>) -> Result<Response, CoachbookError> {
    let invite = Invite::try_from(&query)?;
    let body = render_invite(&invite, Utc::now());
    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"booking.ics\"",
            ),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response())
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/admin/slots/generate",
    request_body = GenerateSlotsRequest,
    responses(
        (status = 200, description = "Slots created", body = GenerateSlotsResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Missing or wrong admin key")
    ),
    security(("admin_key" = [])),
    tag = "Admin"
))]
pub async fn admin_generate_handler(
    State(state): State<Arc<BookingState>>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<Json<GenerateSlotsResponse>, CoachbookError> {
    let created = generate_slots(&state.db, &state.config.booking, &request).await?;
    Ok(Json(GenerateSlotsResponse { created }))
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/admin/slots/bulk",
    request_body = BulkRequest,
    responses(
        (status = 200, description = "Slots changed", body = BulkResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Missing or wrong admin key")
    ),
    security(("admin_key" = [])),
    tag = "Admin"
))]
pub async fn admin_bulk_handler(
    State(state): State<Arc<BookingState>>,
    Json(request): Json<BulkRequest>,
) -> Result<Json<BulkResponse>, CoachbookError> {
    let affected = bulk_update(&state.db, &request).await?;
    Ok(Json(BulkResponse { affected }))
}

/// Bookings whose anchor slot starts in the window.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/admin/bookings",
    params(RangeQuery),
    responses(
        (status = 200, description = "Bookings in the window", body = [Booking]),
        (status = 401, description = "Missing or wrong admin key")
    ),
    security(("admin_key" = [])),
    tag = "Admin"
))]
pub async fn admin_bookings_handler(
    State(state): State<Arc<BookingState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<Booking>>, CoachbookError> {
    let (from, to) = query.resolve(Utc::now())?;
    let bookings = SqlBookingRepository::new(state.db.clone())
        .list_range(from, to)
        .await?;
    info!(count = bookings.len(), "Listed bookings");
    Ok(Json(bookings))
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database are up", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "Booking"
))]
pub async fn health_handler(State(state): State<Arc<BookingState>>) -> (StatusCode, Json<HealthResponse>) {
    if state.db.is_healthy().await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                database: true,
            }),
        )
    } else {
        error!("Health check failed: database unreachable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded".to_string(),
                database: false,
            }),
        )
    }
}
