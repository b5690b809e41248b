// --- File: crates/coachbook_common/src/lib.rs ---

pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod services;

pub use error::{
    conflict, config_error, external_service_error, internal_error, not_found, validation_error,
    CoachbookError, HttpStatusCode,
};

pub use http::{
    client::{create_client, provider_error_message, HTTP_CLIENT},
    error_response, IntoHttpResponse,
};

pub use logging::{init, init_with_level, log_error, log_result};

pub use models::{
    join_ids, parse_id_csv, Booking, BookingMeta, BookingStatus, CheckoutPlan, CheckoutRedirect,
    PaymentConfirmation, PaymentProvider, Slot, SlotId,
};
