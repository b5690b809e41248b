// --- File: crates/coachbook_stripe/src/lib.rs ---

pub mod doc;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod routes;
pub mod service;

// Re-export for main backend
pub use error::StripeError;
pub use handlers::StripeState;
pub use logic::{confirmation_from_session, verify_stripe_signature, CreateCheckoutSessionResponse};
pub use routes::routes;
pub use service::StripePaymentService;
