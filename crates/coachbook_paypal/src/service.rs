// --- File: crates/coachbook_paypal/src/service.rs ---
use coachbook_common::models::{CheckoutPlan, CheckoutRedirect, PaymentProvider};
use coachbook_common::services::{BoxFuture, PaymentService, RefundResult};
use coachbook_config::{AppConfig, PaypalConfig};
use std::sync::Arc;

use crate::error::PaypalError;
use crate::logic::{create_order, refund_capture};

/// PayPal payment service implementation
pub struct PaypalPaymentService {
    config: Arc<AppConfig>,
}

impl PaypalPaymentService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    pub(crate) fn paypal_config(&self) -> Result<&PaypalConfig, PaypalError> {
        self.config.paypal.as_ref().ok_or(PaypalError::ConfigError)
    }
}

impl PaymentService for PaypalPaymentService {
    type Error = PaypalError;

    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Paypal
    }

    fn create_checkout<'a>(
        &'a self,
        plan: &'a CheckoutPlan,
    ) -> BoxFuture<'a, CheckoutRedirect, Self::Error> {
        Box::pin(async move {
            let paypal_config = self.paypal_config()?;
            let order = create_order(paypal_config, &self.config.site, plan).await?;
            Ok(CheckoutRedirect {
                provider: PaymentProvider::Paypal,
                redirect_url: order.approve_url(),
                provider_ref: order.id,
                hold_key: plan.hold_key.clone(),
            })
        })
    }

    /// `payment_ref` is a capture id. Partial refunds are in the booking currency.
    fn create_refund<'a>(
        &'a self,
        payment_ref: &'a str,
        amount: Option<i64>,
        reason: Option<&'a str>,
    ) -> BoxFuture<'a, RefundResult, Self::Error> {
        Box::pin(async move {
            let paypal_config = self.paypal_config()?;
            let amount = amount.map(|cents| (cents, self.config.booking.currency.as_str()));
            refund_capture(paypal_config, payment_ref, amount, reason).await
        })
    }
}
