//! Payment processor integration.
//!
//! The booking core only talks to a [`PaymentGateway`]; the Stripe client is
//! used when a secret key is configured, the mock otherwise.

pub mod gateway;
pub mod mock;
pub mod stripe;
pub mod webhook;

pub use gateway::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};
pub use mock::MockPaymentGateway;
pub use stripe::StripeGateway;

use crate::config::PaymentConfig;
use std::sync::Arc;

/// Pick the gateway matching the configuration.
pub fn gateway_from_config(config: &PaymentConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    if config.stripe_enabled() {
        Ok(Arc::new(StripeGateway::new(config)?))
    } else {
        Ok(Arc::new(MockPaymentGateway::new()))
    }
}
