//! Repository for bookings
//!
//! A booking is keyed by its anchor slot; the unique constraint on `slot_id` is what
//! makes paid-booking upserts re-runnable.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use std::future::Future;

pub use coachbook_common::models::{Booking, BookingStatus, SlotId};

pub trait BookingRepository {
    /// Create the `bookings` table if it doesn't exist
    fn init_schema(&self) -> impl Future<Output = Result<(), DbError>> + Send;

    fn find_by_id(&self, id: &str) -> impl Future<Output = Result<Option<Booking>, DbError>> + Send;

    /// The booking anchored on `slot_id`, if any.
    fn find_by_slot(
        &self,
        slot_id: SlotId,
    ) -> impl Future<Output = Result<Option<Booking>, DbError>> + Send;

    /// Bookings whose anchor slot starts in `[from, to)`, ascending by start time.
    fn list_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Booking>, DbError>> + Send;

    fn count(&self) -> impl Future<Output = Result<i64, DbError>> + Send;
}
