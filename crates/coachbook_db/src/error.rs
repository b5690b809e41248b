//! Error types for the database client

use coachbook_common::{config_error, CoachbookError, HttpStatusCode};
use thiserror::Error;

/// Errors that can occur when working with the database client
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SQLx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Error with database URL parsing
    #[error("Database URL error: {0}")]
    UrlError(String),

    /// Error with database pool creation
    #[error("Database pool error: {0}")]
    PoolError(String),

    /// Error with database query
    #[error("Database query error: {0}")]
    QueryError(String),

    /// Error with database transaction
    #[error("Database transaction error: {0}")]
    TransactionError(String),

    /// A stored value could not be turned back into a domain value
    #[error("Corrupt row: {0}")]
    DecodeError(String),
}

impl From<DbError> for CoachbookError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConfigError(msg) | DbError::UrlError(msg) => config_error(msg),
            other => CoachbookError::DatabaseError(other.to_string()),
        }
    }
}

impl HttpStatusCode for DbError {
    fn status_code(&self) -> u16 {
        500
    }
}
