// --- File: crates/coachbook_paypal/src/lib.rs ---

pub mod doc;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod routes;
pub mod service;

pub use error::PaypalError;
pub use handlers::PaypalState;
pub use logic::{decode_custom_id, encode_custom_id, CustomFields};
pub use routes::routes;
pub use service::PaypalPaymentService;
