// --- File: crates/coachbook_common/src/services.rs ---
//! Seams between the booking core and the payment providers.
//!
//! The core prepares a [`CheckoutPlan`] inside a database transaction, commits, and only
//! then hands the plan to a [`PaymentService`]; no transaction is ever held open across
//! an outbound provider call. Compensating refunds go through the same trait.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::models::{CheckoutPlan, CheckoutRedirect, PaymentProvider};

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A payment provider as seen by the booking core.
pub trait PaymentService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn provider(&self) -> PaymentProvider;

    /// Opens a provider-side payment (session, order) for an already resolved and
    /// priced block.
    fn create_checkout<'a>(
        &'a self,
        plan: &'a CheckoutPlan,
    ) -> BoxFuture<'a, CheckoutRedirect, Self::Error>;

    /// Refunds a captured payment. `payment_ref` is whatever the provider needs to
    /// address the money (payment intent, capture id). `None` amount means in full.
    fn create_refund<'a>(
        &'a self,
        payment_ref: &'a str,
        amount: Option<i64>,
        reason: Option<&'a str>,
    ) -> BoxFuture<'a, RefundResult, Self::Error>;
}

/// Represents the result of a refund operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub id: String,
    pub status: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
}
