use crate::{
    audit,
    config::PaymentConfig,
    db::{
        models::{EventStatus, Payment, PaymentStatus, RegistrationStatus},
        queries,
    },
    payments::{webhook::SettlementNotice, CheckoutRequest, CheckoutSession},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{context::BookingContext, error::BookingError};

/// What a settlement notification did. Every outcome is acknowledged to the
/// processor; only `Settled` changes state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Settled { payment_id: String },
    AlreadyProcessed { payment_id: String, status: PaymentStatus },
    UnknownPayment { payment_id: String },
    Ignored,
}

pub(crate) struct PaymentService {
    ctx: Arc<BookingContext>,
}

impl PaymentService {
    pub(crate) fn new(ctx: Arc<BookingContext>) -> Self {
        Self { ctx }
    }

    /// Apply a verified processor notification.
    pub(crate) async fn apply_notice(
        &self,
        notice: Option<SettlementNotice>,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome, BookingError> {
        match notice {
            Some(SettlementNotice::Completed {
                payment_id,
                external_ref,
            }) => self.settle(&payment_id, &external_ref, now).await,
            Some(SettlementNotice::Failed { payment_id, reason }) => {
                tracing::info!(
                    "Checkout for payment {} did not complete ({}); payment stays pending",
                    payment_id,
                    reason
                );
                Ok(SettlementOutcome::Ignored)
            }
            None => Ok(SettlementOutcome::Ignored),
        }
    }

    /// Move a pending payment to paid. Repeated notifications are no-ops.
    pub(crate) async fn settle(
        &self,
        payment_id: &str,
        external_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome, BookingError> {
        let result = sqlx::query(
            "UPDATE payments SET status = 'paid', external_ref = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(external_ref)
        .bind(now.to_rfc3339())
        .bind(payment_id)
        .execute(&self.ctx.pool)
        .await?;

        if result.rows_affected() == 1 {
            tracing::info!("Payment {} settled ({})", payment_id, external_ref);
            audit::log_payment_event(payment_id, "settled", None);
            return Ok(SettlementOutcome::Settled {
                payment_id: payment_id.to_string(),
            });
        }

        match self.ctx.load_payment(payment_id).await {
            Ok(payment) => {
                if payment.status == PaymentStatus::Refunded {
                    tracing::warn!(
                        "Settlement {} arrived for voided payment {}; the charge must be refunded manually",
                        external_ref,
                        payment_id
                    );
                } else {
                    tracing::info!(
                        "Duplicate settlement for payment {} ignored (status {})",
                        payment_id,
                        payment.status.as_str()
                    );
                }
                Ok(SettlementOutcome::AlreadyProcessed {
                    payment_id: payment.id,
                    status: payment.status,
                })
            }
            Err(BookingError::PaymentNotFound) => {
                tracing::warn!("Settlement for unknown payment {} ignored", payment_id);
                Ok(SettlementOutcome::UnknownPayment {
                    payment_id: payment_id.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Refund a settled payment on behalf of the association running its event.
    pub(crate) async fn refund(
        &self,
        payment_id: &str,
        association_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Payment, BookingError> {
        let payment = self.ctx.load_payment(payment_id).await?;
        let event = self.ctx.load_event(&payment.event_id).await?;
        if event.association_id != association_id {
            return Err(BookingError::NotOwner);
        }

        let _guard = self.ctx.lock_event(&event.id).await;

        let mut payment = self.ctx.load_payment(payment_id).await?;
        if !payment.status.can_transition_to(PaymentStatus::Refunded) {
            return Err(BookingError::InvalidPaymentState {
                expected: PaymentStatus::Paid,
                actual: payment.status,
            });
        }

        let external_ref =
            payment
                .external_ref
                .clone()
                .ok_or(BookingError::InvalidPaymentState {
                    expected: PaymentStatus::Paid,
                    actual: payment.status,
                })?;

        // A processor failure leaves the payment paid.
        let refund_id = match self.ctx.gateway.refund(&external_ref, payment.total()).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Refund of payment {} failed: {}", payment.id, e);
                return Err(e.into());
            }
        };

        let updated_at = now.to_rfc3339();
        let result = sqlx::query(
            "UPDATE payments SET status = 'refunded', updated_at = ? WHERE id = ? AND status = 'paid'",
        )
        .bind(&updated_at)
        .bind(&payment.id)
        .execute(&self.ctx.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.ctx.load_payment(payment_id).await?;
            tracing::error!(
                "Refund {} issued for payment {} but its status moved to {}; reconcile manually",
                refund_id,
                payment.id,
                current.status.as_str()
            );
            return Err(BookingError::InvalidPaymentState {
                expected: PaymentStatus::Paid,
                actual: current.status,
            });
        }

        payment.status = PaymentStatus::Refunded;
        payment.updated_at = updated_at;

        tracing::info!("Payment {} refunded ({})", payment.id, refund_id);
        audit::log_payment_event(&payment.id, "refunded", Some(payment.total()));

        Ok(payment)
    }

    /// Open a hosted checkout page for the player's pending payment.
    pub(crate) async fn start_checkout(
        &self,
        player_id: &str,
        payment_id: &str,
        config: &PaymentConfig,
    ) -> Result<CheckoutSession, BookingError> {
        let payment = self.ctx.load_payment(payment_id).await?;
        if payment.player_id != player_id {
            return Err(BookingError::NotOwner);
        }
        if payment.status != PaymentStatus::Pending {
            return Err(BookingError::InvalidPaymentState {
                expected: PaymentStatus::Pending,
                actual: payment.status,
            });
        }

        // Only a seat the player still holds may be paid for.
        let registration = queries::find_registration_by_payment(&self.ctx.pool, &payment.id)
            .await?
            .ok_or(BookingError::RegistrationNotFound)?;
        if registration.status != RegistrationStatus::Validated {
            return Err(BookingError::InvalidRegistrationState {
                actual: registration.status,
            });
        }

        let event = self.ctx.load_event(&payment.event_id).await?;
        if event.status == EventStatus::Cancelled {
            return Err(BookingError::EventUnavailable);
        }

        let session = self
            .ctx
            .gateway
            .create_checkout_session(CheckoutRequest {
                payment_id: payment.id.clone(),
                event_name: event.name.clone(),
                amount: payment.amount,
                commission: payment.commission,
                currency: config.currency.clone(),
                success_url: format!(
                    "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
                    config.frontend_url
                ),
                cancel_url: format!("{}/payment/cancel", config.frontend_url),
            })
            .await?;

        sqlx::query(
            "UPDATE payments SET checkout_session_id = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&session.session_id)
        .bind(Utc::now().to_rfc3339())
        .bind(&payment.id)
        .execute(&self.ctx.pool)
        .await?;

        tracing::info!(
            "Checkout session {} opened for payment {}",
            session.session_id,
            payment.id
        );

        Ok(session)
    }
}
