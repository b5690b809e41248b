//! Repository modules for database access
//!
//! Each entity has a trait (pool-level operations), a SQL implementation, and
//! connection-scoped associated functions on the SQL type for work that must run
//! inside a caller's transaction.

pub mod booking;
pub mod booking_sql;
pub mod processed_event;
pub mod processed_event_sql;
pub mod slot;
pub mod slot_sql;

pub use booking::BookingRepository;
pub use booking_sql::{PaidUpsert, SqlBookingRepository};
pub use processed_event::ProcessedEventRepository;
pub use processed_event_sql::SqlProcessedEventRepository;
pub use slot::SlotRepository;
pub use slot_sql::SqlSlotRepository;

use crate::error::DbError;
use chrono::{DateTime, Utc};
use tracing::error;

/// Timestamps are stored as unix seconds.
pub(crate) fn to_ts(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

pub(crate) fn from_ts(secs: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| DbError::DecodeError(format!("timestamp out of range: {}", secs)))
}

/// `$first, $first+1, ...` for `count` parameters.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|n| format!("${}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn query_failed(what: &'static str) -> impl FnOnce(sqlx::Error) -> DbError {
    move |e| {
        error!("Failed to {}: {}", what, e);
        DbError::QueryError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_lists_are_numbered_from_offset() {
        assert_eq!(placeholders(1, 3), "$1, $2, $3");
        assert_eq!(placeholders(2, 1), "$2");
        assert_eq!(placeholders(1, 0), "");
    }

    #[test]
    fn timestamps_round_trip_at_second_precision() {
        let at = from_ts(1_740_834_000).unwrap();
        assert_eq!(to_ts(at), 1_740_834_000);
    }
}
