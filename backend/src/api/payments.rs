use crate::{
    api::{current_user, require_organizer, require_player, AppState},
    audit,
    db::models::Payment,
    error::{AppError, Result},
    payments::{
        webhook::{verify_signature, WebhookEvent},
        CheckoutSession,
    },
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub payment_id: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PaymentHistoryEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub payment: Payment,
    pub event_name: String,
    pub event_starts_at: DateTime<Utc>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/webhook", post(webhook))
        .route("/history", get(history))
        .route("/:id/refund", post(refund))
}

async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutSession>> {
    let player = require_player(&state, &headers).await?;

    let session = state
        .bookings
        .start_checkout(&player.id, &req.payment_id, &state.payments)
        .await?;

    Ok(Json(session))
}

/// Settlement notifications. The raw body is needed to check the signature.
async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok());

    if let Err(e) = verify_signature(
        &state.payments.stripe_webhook_secret,
        signature,
        &body,
        Utc::now(),
    ) {
        audit::log_security_event("payments_webhook", "bad_signature", &e.to_string());
        return Err(AppError::BadRequest(format!("Webhook error: {}", e)));
    }

    // Authentic but unreadable: acknowledge so the processor stops retrying.
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Ignoring signed webhook with an unreadable body: {}", e);
            return Ok(Json(json!({ "received": true })));
        }
    };

    let outcome = state
        .bookings
        .apply_settlement(event.settlement_notice())
        .await?;

    tracing::debug!("Webhook {} handled: {:?}", event.event_type, outcome);

    Ok(Json(json!({ "received": true })))
}

async fn history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PaymentHistoryEntry>>> {
    let user = current_user(&state, &headers).await?;

    let payments: Vec<PaymentHistoryEntry> = sqlx::query_as(
        "SELECT p.*, e.name AS event_name, e.starts_at AS event_starts_at
         FROM payments p
         JOIN events e ON e.id = p.event_id
         WHERE p.player_id = ?
         ORDER BY p.created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(payments))
}

async fn refund(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(payment_id): Path<String>,
) -> Result<Json<Payment>> {
    let (_, association) = require_organizer(&state, &headers).await?;

    let payment = state.bookings.refund(&payment_id, &association.id).await?;

    Ok(Json(payment))
}
