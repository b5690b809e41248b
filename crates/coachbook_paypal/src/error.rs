// --- File: crates/coachbook_paypal/src/error.rs ---
use coachbook_booking::BookingError;
use coachbook_common::{
    config_error, external_service_error, internal_error, validation_error, CoachbookError,
    HttpStatusCode,
};
use thiserror::Error;

/// PayPal-specific error types.
#[derive(Error, Debug)]
pub enum PaypalError {
    /// Error occurred during a PayPal API request
    #[error("PayPal API request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Error returned by the PayPal API
    #[error("PayPal API returned an error: {message} (Status: {status_code})")]
    ApiError { status_code: u16, message: String },

    /// Error parsing a PayPal API response
    #[error("Failed to parse PayPal API response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing PayPal configuration or credentials
    #[error("PayPal configuration missing or incomplete")]
    ConfigError,

    /// The OAuth token request was refused
    #[error("PayPal authentication failed: {0}")]
    AuthError(String),

    /// Capture returned a status other than COMPLETED
    #[error("PayPal order not completed (status: {0})")]
    NotCompleted(String),

    /// The encoded order metadata does not fit PayPal's custom_id field
    #[error("Order metadata too long for PayPal custom_id: {len} > {limit} characters")]
    CustomIdTooLong { len: usize, limit: usize },

    /// A captured order carries no readable custom_id
    #[error("Captured PayPal order has no readable custom_id")]
    MissingCustomId,

    /// The booking core refused or failed
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// Internal processing error
    #[error("Internal processing error: {0}")]
    InternalError(String),
}

impl PaypalError {
    /// Machine-readable kind for the error body, where it differs from the shared
    /// taxonomy.
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            PaypalError::NotCompleted(_) => Some("not_completed"),
            PaypalError::CustomIdTooLong { .. } => Some("custom_id_too_long"),
            _ => None,
        }
    }
}

/// Convert PaypalError to CoachbookError
impl From<PaypalError> for CoachbookError {
    fn from(err: PaypalError) -> Self {
        match err {
            PaypalError::RequestError(e) => {
                CoachbookError::HttpError(format!("PayPal request error: {}", e))
            }
            PaypalError::ApiError {
                status_code,
                message,
            } => external_service_error(
                "PayPal API",
                format!("Status: {}, Message: {}", status_code, message),
            ),
            PaypalError::ParseError(e) => {
                external_service_error("PayPal API", format!("Unreadable response: {}", e))
            }
            PaypalError::ConfigError => config_error("PayPal configuration missing or incomplete"),
            PaypalError::AuthError(msg) => external_service_error("PayPal OAuth", msg),
            e @ PaypalError::NotCompleted(_) => validation_error(e),
            e @ PaypalError::CustomIdTooLong { .. } => validation_error(e),
            e @ PaypalError::MissingCustomId => external_service_error("PayPal API", e),
            PaypalError::Booking(e) => e.into(),
            PaypalError::InternalError(msg) => internal_error(format!("PayPal internal error: {}", msg)),
        }
    }
}

impl HttpStatusCode for PaypalError {
    fn status_code(&self) -> u16 {
        match self {
            PaypalError::RequestError(_)
            | PaypalError::ApiError { .. }
            | PaypalError::ParseError(_)
            | PaypalError::AuthError(_)
            | PaypalError::MissingCustomId => 502,
            PaypalError::ConfigError | PaypalError::InternalError(_) => 500,
            PaypalError::NotCompleted(_) | PaypalError::CustomIdTooLong { .. } => 400,
            PaypalError::Booking(e) => e.status_code(),
        }
    }
}
