// --- File: crates/coachbook_booking/src/error.rs ---
use coachbook_common::{conflict, internal_error, not_found, validation_error, CoachbookError, HttpStatusCode};
use coachbook_db::{DbError, SqlxError};
use thiserror::Error;

/// Errors raised by the booking core.
///
/// Conflicts are kept apart from validation failures so clients can offer "pick
/// another time" instead of "fix your input".
#[derive(Error, Debug)]
pub enum BookingError {
    /// Malformed or out-of-range input, rejected before touching storage
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The block is missing slots, has gaps, or overlaps a taken slot
    #[error("Requested time block is unavailable")]
    Unavailable,

    /// The caller tried to resume a hold that has lapsed
    #[error("Hold expired")]
    HoldExpired,

    /// Another checkout holds part of the block
    #[error("Slot is held by another checkout")]
    HoldMismatch,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Internal booking error: {0}")]
    Internal(String),
}

// Transactions surface raw sqlx errors on commit.
impl From<SqlxError> for BookingError {
    fn from(err: SqlxError) -> Self {
        BookingError::Db(DbError::from(err))
    }
}

impl BookingError {
    pub fn validation<T: std::fmt::Display>(message: T) -> Self {
        BookingError::Validation(message.to_string())
    }

    /// Machine-readable code for conflict responses.
    pub fn conflict_code(&self) -> Option<&'static str> {
        match self {
            BookingError::Unavailable => Some("unavailable"),
            BookingError::HoldExpired => Some("hold_expired"),
            BookingError::HoldMismatch => Some("hold_mismatch"),
            _ => None,
        }
    }
}

impl From<BookingError> for CoachbookError {
    fn from(err: BookingError) -> Self {
        if let Some(code) = err.conflict_code() {
            return conflict(code, err.to_string());
        }
        match err {
            BookingError::Validation(msg) => validation_error(msg),
            BookingError::NotFound(msg) => not_found(msg),
            BookingError::Db(e) => e.into(),
            other => internal_error(other),
        }
    }
}

impl HttpStatusCode for BookingError {
    fn status_code(&self) -> u16 {
        match self {
            BookingError::Validation(_) => 400,
            BookingError::Unavailable | BookingError::HoldExpired | BookingError::HoldMismatch => {
                409
            }
            BookingError::NotFound(_) => 404,
            BookingError::Db(_) | BookingError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_to_distinct_codes() {
        let unavailable: CoachbookError = BookingError::Unavailable.into();
        assert_eq!(unavailable.kind(), "unavailable");
        assert_eq!(unavailable.status_code(), 409);

        let mismatch: CoachbookError = BookingError::HoldMismatch.into();
        assert_eq!(mismatch.kind(), "hold_mismatch");

        let expired: CoachbookError = BookingError::HoldExpired.into();
        assert_eq!(expired.kind(), "hold_expired");
    }

    #[test]
    fn validation_is_a_client_error() {
        let err = BookingError::validation("liveMinutes out of range");
        assert_eq!(err.status_code(), 400);
        let mapped: CoachbookError = err.into();
        assert_eq!(mapped.status_code(), 400);
        assert_eq!(mapped.kind(), "validation");
    }
}
