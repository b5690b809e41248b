// --- File: crates/coachbook_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type shared by all coachbook crates.
///
/// Each crate keeps its own error enum and provides `From<CrateError> for CoachbookError`
/// so handlers can fall back to one uniform HTTP rendering.
#[derive(Error, Debug)]
pub enum CoachbookError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during authentication or authorization
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// The requested time is no longer available, or someone else holds it.
    /// `code` is a stable machine-readable reason such as `unavailable`.
    #[error("Conflict: {message}")]
    ConflictError { code: String, message: String },

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for CoachbookError {
    fn status_code(&self) -> u16 {
        match self {
            CoachbookError::HttpError(_) => 502,
            CoachbookError::ParseError(_) => 400,
            CoachbookError::ConfigError(_) => 500,
            CoachbookError::AuthError(_) => 401,
            CoachbookError::ValidationError(_) => 400,
            CoachbookError::DatabaseError(_) => 500,
            CoachbookError::ExternalServiceError { .. } => 502,
            CoachbookError::ConflictError { .. } => 409,
            CoachbookError::NotFoundError(_) => 404,
            CoachbookError::InternalError(_) => 500,
        }
    }
}

impl CoachbookError {
    /// Stable, machine-readable error kind for response bodies.
    pub fn kind(&self) -> &str {
        match self {
            CoachbookError::HttpError(_) => "upstream",
            CoachbookError::ParseError(_) => "parse",
            CoachbookError::ConfigError(_) => "config",
            CoachbookError::AuthError(_) => "unauthorized",
            CoachbookError::ValidationError(_) => "validation",
            CoachbookError::DatabaseError(_) => "database",
            CoachbookError::ExternalServiceError { .. } => "upstream",
            CoachbookError::ConflictError { code, .. } => code.as_str(),
            CoachbookError::NotFoundError(_) => "not_found",
            CoachbookError::InternalError(_) => "internal",
        }
    }

    /// Message safe to hand to a client.
    ///
    /// Upstream and internal failures are logged in full where they happen; the
    /// client only learns that something failed.
    pub fn public_message(&self) -> String {
        match self {
            CoachbookError::HttpError(_) | CoachbookError::ExternalServiceError { .. } => {
                "Payment provider request failed".to_string()
            }
            CoachbookError::ConfigError(_)
            | CoachbookError::DatabaseError(_)
            | CoachbookError::InternalError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

// Common error conversions
impl From<reqwest::Error> for CoachbookError {
    fn from(err: reqwest::Error) -> Self {
        CoachbookError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for CoachbookError {
    fn from(err: serde_json::Error) -> Self {
        CoachbookError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for CoachbookError {
    fn from(err: std::io::Error) -> Self {
        CoachbookError::InternalError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> CoachbookError {
    CoachbookError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> CoachbookError {
    CoachbookError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> CoachbookError {
    CoachbookError::NotFoundError(message.to_string())
}

pub fn conflict<T: fmt::Display>(code: &str, message: T) -> CoachbookError {
    CoachbookError::ConflictError {
        code: code.to_string(),
        message: message.to_string(),
    }
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> CoachbookError {
    CoachbookError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> CoachbookError {
    CoachbookError::InternalError(message.to_string())
}
