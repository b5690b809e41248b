//! Repository for atomic slots
//!
//! Slots are created in bulk on a fixed grid, flipped to taken by bookings and
//! finalization, and carry a transient hold while a buyer is paying.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use std::future::Future;

pub use coachbook_common::models::{Slot, SlotId};

/// Pool-level slot operations.
///
/// Anything that has to share a transaction with other writes lives on
/// [`SqlSlotRepository`](super::SqlSlotRepository) as a `*_in` function taking a
/// connection.
pub trait SlotRepository {
    /// Create the `slots` table and its index if they don't exist
    fn init_schema(&self) -> impl Future<Output = Result<(), DbError>> + Send;

    fn find_by_id(&self, id: SlotId) -> impl Future<Output = Result<Option<Slot>, DbError>> + Send;

    /// All slots starting in `[from, to)`, ascending by start time.
    fn list_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Slot>, DbError>> + Send;

    /// Untaken slots starting in `[from, to)`, ascending by start time.
    fn list_free_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Slot>, DbError>> + Send;

    /// Insert one free slot per start time. Start times that already exist are
    /// skipped; returns how many rows were created.
    fn insert_grid(
        &self,
        starts: &[DateTime<Utc>],
        duration_min: i64,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    /// Set `is_taken` on every slot starting in `[from, to)`. Freeing a slot also
    /// drops its hold.
    fn bulk_set_taken(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        taken: bool,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    /// Delete every slot starting in `[from, to)`.
    fn bulk_delete(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;
}
