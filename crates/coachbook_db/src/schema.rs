//! Schema bootstrap for all coachbook tables

use crate::client::DbClient;
use crate::error::DbError;
use crate::repositories::{
    BookingRepository, ProcessedEventRepository, SlotRepository, SqlBookingRepository,
    SqlProcessedEventRepository, SqlSlotRepository,
};
use tracing::info;

/// Create every table and index that doesn't exist yet. Safe to run on each start.
pub async fn init_schema(db_client: &DbClient) -> Result<(), DbError> {
    SqlSlotRepository::new(db_client.clone()).init_schema().await?;
    SqlBookingRepository::new(db_client.clone()).init_schema().await?;
    SqlProcessedEventRepository::new(db_client.clone())
        .init_schema()
        .await?;

    info!("Database schema ready");
    Ok(())
}
