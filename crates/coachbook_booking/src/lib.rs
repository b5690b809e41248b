// --- File: crates/coachbook_booking/src/lib.rs ---
pub mod admin;
pub mod auth;
pub mod availability;
pub mod block;
#[cfg(test)]
mod block_proptest;
pub mod checkout;
pub mod direct;
pub mod doc;
pub mod error;
pub mod finalize;
pub mod handlers;
pub mod hold;
pub mod ics;
pub mod pricing;
pub mod routes;
#[cfg(test)]
mod routes_test;

pub use checkout::{create_checkout, prepare_checkout, release_plan_holds, CheckoutRequest};
pub use error::BookingError;
pub use finalize::{finalize, finalize_or_refund, FinalizeOutcome};
pub use handlers::BookingState;
pub use routes::routes;
