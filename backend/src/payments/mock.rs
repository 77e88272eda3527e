use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use super::gateway::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};

/// In-process gateway used in development and tests.
///
/// Refunds can be switched to fail to exercise the upstream-error paths.
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    fail_refunds: AtomicBool,
    refunds_issued: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn refunds_issued(&self) -> usize {
        self.refunds_issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let session_id = format!("cs_mock_{}", Uuid::new_v4().simple());

        tracing::info!(
            payment_id = %request.payment_id,
            amount = request.amount + request.commission,
            session_id = %session_id,
            "Mock checkout session created"
        );

        Ok(CheckoutSession {
            url: Some(
                request
                    .success_url
                    .replace("{CHECKOUT_SESSION_ID}", &session_id),
            ),
            session_id,
        })
    }

    async fn refund(&self, external_ref: &str, amount: i64) -> Result<String, GatewayError> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            tracing::warn!(external_ref = %external_ref, "Mock refund failing on request");
            return Err(GatewayError::Timeout);
        }

        self.refunds_issued.fetch_add(1, Ordering::SeqCst);
        let refund_id = format!("re_mock_{}", Uuid::new_v4().simple());

        tracing::info!(
            external_ref = %external_ref,
            amount = amount,
            refund_id = %refund_id,
            "Mock refund processed"
        );

        Ok(refund_id)
    }
}
