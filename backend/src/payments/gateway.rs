use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Everything the processor needs to open a hosted checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub payment_id: String,
    pub event_name: String,
    pub amount: i64,     // cents
    pub commission: i64, // cents
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// No answer within the configured timeout.
    Timeout,
    /// The processor answered with an error.
    Rejected { status: u16, message: String },
    /// Transport-level failure (DNS, TLS, connection reset).
    Transport(String),
    /// The processor answered with something we could not read.
    InvalidResponse(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Timeout => write!(f, "Payment processor timed out"),
            GatewayError::Rejected { status, message } => {
                write!(f, "Payment processor rejected the request ({}): {}", status, message)
            }
            GatewayError::Transport(msg) => write!(f, "Payment processor unreachable: {}", msg),
            GatewayError::InvalidResponse(msg) => {
                write!(f, "Unexpected payment processor response: {}", msg)
            }
        }
    }
}

impl std::error::Error for GatewayError {}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Refund a settled charge. Returns the processor's refund id.
    async fn refund(&self, external_ref: &str, amount: i64) -> Result<String, GatewayError>;
}
