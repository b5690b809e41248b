//! Storage for coachbook
//!
//! Slots, bookings and the payment-event ledger on top of an `sqlx::Any` pool.
//! SQLite is the default backend; PostgreSQL is available through the `postgres`
//! feature.
//!
//! # Example
//!
//! ```rust,no_run
//! use coachbook_config::AppConfig;
//! use coachbook_db::{init_schema, DbClient};
//! use std::sync::Arc;
//!
//! async fn setup_db() -> Result<DbClient, Box<dyn std::error::Error>> {
//!     let config = Arc::new(AppConfig::default());
//!     let db_client = DbClient::new(&config).await?;
//!     init_schema(&db_client).await?;
//!     Ok(db_client)
//! }
//! ```

pub mod client;
pub mod error;
pub mod repositories;
pub mod schema;

pub use client::{Backend, DbClient, DbConnection, DbTransaction};
pub use error::DbError;
pub use schema::init_schema;
pub use sqlx::Error as SqlxError;

pub use repositories::{
    BookingRepository, PaidUpsert, ProcessedEventRepository, SlotRepository, SqlBookingRepository,
    SqlProcessedEventRepository, SqlSlotRepository,
};
