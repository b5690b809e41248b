// --- File: crates/coachbook_stripe/src/error.rs ---
use coachbook_booking::BookingError;
use coachbook_common::{
    config_error, external_service_error, internal_error, CoachbookError, HttpStatusCode,
};
use thiserror::Error;

/// Stripe-specific error types.
#[derive(Error, Debug)]
pub enum StripeError {
    /// Error occurred during a Stripe API request
    #[error("Stripe API request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Error returned by the Stripe API
    #[error("Stripe API returned an error: {message} (Status: {status_code})")]
    ApiError { status_code: u16, message: String },

    /// Error parsing Stripe API response
    #[error("Failed to parse Stripe API response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing or incomplete Stripe configuration
    #[error("Stripe configuration missing or incomplete")]
    ConfigError,

    /// Webhook signature verification failed
    #[error("Stripe webhook signature verification failed: {0}")]
    WebhookSignatureError(String),

    /// Webhook event processing error
    #[error("Stripe webhook event processing error: {0}")]
    WebhookProcessingError(String),

    /// A paid checkout session that doesn't name a slot to book
    #[error("Checkout session {0} carries no slot id")]
    MissingSlotId(String),

    /// The booking core refused or failed
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// Internal processing error
    #[error("Internal processing error: {0}")]
    InternalError(String),
}

/// Convert StripeError to CoachbookError
impl From<StripeError> for CoachbookError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::RequestError(e) => {
                CoachbookError::HttpError(format!("Stripe request error: {}", e))
            }
            StripeError::ApiError {
                status_code,
                message,
            } => external_service_error(
                "Stripe API",
                format!("Status: {}, Message: {}", status_code, message),
            ),
            StripeError::ParseError(e) => {
                external_service_error("Stripe API", format!("Unreadable response: {}", e))
            }
            StripeError::ConfigError => config_error("Stripe configuration missing or incomplete"),
            StripeError::WebhookSignatureError(msg) => {
                CoachbookError::AuthError(format!("Stripe webhook signature error: {}", msg))
            }
            StripeError::WebhookProcessingError(msg) => external_service_error("Stripe webhook", msg),
            e @ StripeError::MissingSlotId(_) => external_service_error("Stripe webhook", e),
            StripeError::Booking(e) => e.into(),
            StripeError::InternalError(msg) => internal_error(format!("Stripe internal error: {}", msg)),
        }
    }
}

impl HttpStatusCode for StripeError {
    fn status_code(&self) -> u16 {
        match self {
            StripeError::RequestError(_) => 502,
            StripeError::ApiError { .. } => 502,
            StripeError::ParseError(_) => 502,
            StripeError::ConfigError => 500,
            StripeError::WebhookSignatureError(_) => 400,
            StripeError::WebhookProcessingError(_) => 500,
            StripeError::MissingSlotId(_) => 502,
            StripeError::Booking(e) => e.status_code(),
            StripeError::InternalError(_) => 500,
        }
    }
}
