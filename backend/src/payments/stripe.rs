use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::gateway::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};
use crate::config::PaymentConfig;

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

/// Stripe REST client (form-encoded requests, bearer secret key).
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &PaymentConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            secret_key: config.stripe_secret_key.clone(),
            base_url: STRIPE_API_URL.to_string(),
        })
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| "no error message".to_string());
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

/// Form fields for a checkout session: one line for the event, one for the
/// service fee, and the internal payment id in the metadata so the webhook
/// can find the payment again.
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("metadata[payment_id]".to_string(), request.payment_id.clone()),
        (
            "payment_intent_data[metadata][payment_id]".to_string(),
            request.payment_id.clone(),
        ),
    ];

    let lines = [
        (
            request.event_name.clone(),
            format!("Registration for {}", request.event_name),
            request.amount,
        ),
        (
            "Service fee".to_string(),
            "Booking fee".to_string(),
            request.commission,
        ),
    ];

    for (i, (name, description, unit_amount)) in lines.into_iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        form.push((
            format!("{}[price_data][currency]", prefix),
            request.currency.clone(),
        ));
        form.push((format!("{}[price_data][product_data][name]", prefix), name));
        form.push((
            format!("{}[price_data][product_data][description]", prefix),
            description,
        ));
        form.push((
            format!("{}[price_data][unit_amount]", prefix),
            unit_amount.to_string(),
        ));
        form.push((format!("{}[quantity]", prefix), "1".to_string()));
    }

    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let form = checkout_form(&request);
        let session: SessionResponse = self.post_form("/checkout/sessions", &form).await?;

        tracing::info!(
            payment_id = %request.payment_id,
            session_id = %session.id,
            "Stripe checkout session created"
        );

        Ok(CheckoutSession {
            session_id: session.id,
            url: session.url,
        })
    }

    async fn refund(&self, external_ref: &str, amount: i64) -> Result<String, GatewayError> {
        let form = vec![
            ("payment_intent".to_string(), external_ref.to_string()),
            ("amount".to_string(), amount.to_string()),
        ];
        let refund: RefundResponse = self.post_form("/refunds", &form).await?;

        tracing::info!(
            external_ref = %external_ref,
            refund_id = %refund.id,
            "Stripe refund issued"
        );

        Ok(refund.id)
    }
}
