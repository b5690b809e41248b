// --- File: crates/coachbook_stripe/src/service.rs ---
use coachbook_common::models::{CheckoutPlan, CheckoutRedirect, PaymentProvider};
use coachbook_common::services::{BoxFuture, PaymentService, RefundResult};
use coachbook_config::{AppConfig, StripeConfig};
use std::sync::Arc;

use crate::error::StripeError;
use crate::logic::{create_checkout_session, create_refund};

/// Stripe payment service implementation
pub struct StripePaymentService {
    config: Arc<AppConfig>,
}

impl StripePaymentService {
    /// Create a new Stripe payment service
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    fn stripe_config(&self) -> Result<&StripeConfig, StripeError> {
        self.config.stripe.as_ref().ok_or(StripeError::ConfigError)
    }
}

impl PaymentService for StripePaymentService {
    type Error = StripeError;

    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    fn create_checkout<'a>(
        &'a self,
        plan: &'a CheckoutPlan,
    ) -> BoxFuture<'a, CheckoutRedirect, Self::Error> {
        Box::pin(async move {
            let stripe_config = self.stripe_config()?;
            let session = create_checkout_session(stripe_config, &self.config.site, plan).await?;
            Ok(CheckoutRedirect {
                provider: PaymentProvider::Stripe,
                provider_ref: session.session_id,
                redirect_url: Some(session.url),
                hold_key: plan.hold_key.clone(),
            })
        })
    }

    fn create_refund<'a>(
        &'a self,
        payment_ref: &'a str,
        amount: Option<i64>,
        reason: Option<&'a str>,
    ) -> BoxFuture<'a, RefundResult, Self::Error> {
        Box::pin(async move {
            let stripe_config = self.stripe_config()?;
            create_refund(stripe_config, payment_ref, amount, reason).await
        })
    }
}
