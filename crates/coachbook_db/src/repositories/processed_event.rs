//! Repository for the payment-event idempotency ledger

use crate::error::DbError;
use std::future::Future;

pub trait ProcessedEventRepository {
    /// Create the `processed_events` table if it doesn't exist
    fn init_schema(&self) -> impl Future<Output = Result<(), DbError>> + Send;

    fn exists(&self, event_id: &str) -> impl Future<Output = Result<bool, DbError>> + Send;

    fn count(&self) -> impl Future<Output = Result<i64, DbError>> + Send;
}
