// File: crates/coachbook_booking/src/doc.rs
#![cfg(feature = "openapi")]

use crate::admin::{BulkAction, BulkRequest, BulkResponse, GenerateSlotsRequest, GenerateSlotsResponse};
use crate::availability::AvailableStart;
use crate::checkout::CheckoutRequest;
use crate::direct::DirectBookingRequest;
use crate::finalize::FinalizeOutcome;
use crate::handlers::HealthResponse;
use crate::pricing::PriceQuote;
use coachbook_common::models::{Booking, BookingStatus, PaymentProvider, Slot};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct AdminKeyScheme;

impl Modify for AdminKeyScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "admin_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                crate::auth::ADMIN_KEY_HEADER,
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::get_slots_handler,
        crate::handlers::get_availability_handler,
        crate::handlers::price_handler,
        crate::handlers::create_booking_handler,
        crate::handlers::ics_handler,
        crate::handlers::admin_generate_handler,
        crate::handlers::admin_bulk_handler,
        crate::handlers::admin_bookings_handler,
        crate::handlers::health_handler
    ),
    components(
        schemas(
            Slot,
            Booking,
            BookingStatus,
            PaymentProvider,
            AvailableStart,
            PriceQuote,
            DirectBookingRequest,
            CheckoutRequest,
            FinalizeOutcome,
            GenerateSlotsRequest,
            GenerateSlotsResponse,
            BulkAction,
            BulkRequest,
            BulkResponse,
            HealthResponse
        )
    ),
    modifiers(&AdminKeyScheme),
    tags(
        (name = "Booking", description = "Slots, availability and direct bookings"),
        (name = "Admin", description = "Slot maintenance, requires x-admin-key")
    ),
    servers(
        (url = "/api", description = "Coachbook API server")
    )
)]
pub struct BookingApiDoc;
