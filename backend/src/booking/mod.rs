//! Booking Manager
//!
//! Owns the registration and payment lifecycle:
//! - Admission control against event capacity
//! - Cancellation inside the refund window
//! - Settlement notifications and refunds
//! - Event cancellation and capacity changes
//! - Blocking registrations of banned players

mod context;
pub mod error;
pub mod lifecycle;
pub mod payment;
pub mod registration;

pub use error::BookingError;
pub use lifecycle::{derive_status, EventChanges};
pub use payment::SettlementOutcome;
pub use registration::{
    cancellation_window_open, Admission, BlockedRegistration, Cancellation,
    CANCELLATION_LEAD_HOURS,
};

use crate::{
    config::PaymentConfig,
    db::{
        models::{Ban, Event, Payment},
        DbPool,
    },
    payments::{webhook::SettlementNotice, CheckoutSession, PaymentGateway},
    ws::Notifier,
};
use chrono::Utc;
use std::sync::Arc;

use context::BookingContext;
use lifecycle::EventLifecycle;
use payment::PaymentService;
use registration::RegistrationService;

pub struct BookingManager {
    ctx: Arc<BookingContext>,
    registrations: RegistrationService,
    payments: PaymentService,
    lifecycle: EventLifecycle,
}

impl BookingManager {
    pub fn new(
        pool: DbPool,
        notifier: Arc<dyn Notifier>,
        gateway: Arc<dyn PaymentGateway>,
        service_fee: i64,
    ) -> Self {
        let ctx = Arc::new(BookingContext::new(pool, notifier, gateway, service_fee));
        Self {
            registrations: RegistrationService::new(ctx.clone()),
            payments: PaymentService::new(ctx.clone()),
            lifecycle: EventLifecycle::new(ctx.clone()),
            ctx,
        }
    }

    /// Release per-event locks that are no longer in use.
    pub async fn prune_idle_locks(&self) -> usize {
        self.ctx.prune_event_locks().await
    }

    pub async fn register(
        &self,
        player_id: &str,
        event_id: &str,
    ) -> Result<Admission, BookingError> {
        self.registrations.admit(player_id, event_id).await
    }

    pub async fn cancel_registration(
        &self,
        player_id: &str,
        registration_id: &str,
    ) -> Result<Cancellation, BookingError> {
        self.registrations
            .cancel(player_id, registration_id, Utc::now())
            .await
    }

    pub async fn ban_player(
        &self,
        association_id: &str,
        player_id: &str,
        reason: &str,
    ) -> Result<(Ban, Vec<BlockedRegistration>), BookingError> {
        self.registrations
            .ban_player(association_id, player_id, reason, Utc::now())
            .await
    }

    pub async fn apply_settlement(
        &self,
        notice: Option<SettlementNotice>,
    ) -> Result<SettlementOutcome, BookingError> {
        self.payments.apply_notice(notice, Utc::now()).await
    }

    pub async fn refund(
        &self,
        payment_id: &str,
        association_id: &str,
    ) -> Result<Payment, BookingError> {
        self.payments
            .refund(payment_id, association_id, Utc::now())
            .await
    }

    pub async fn start_checkout(
        &self,
        player_id: &str,
        payment_id: &str,
        config: &PaymentConfig,
    ) -> Result<CheckoutSession, BookingError> {
        self.payments
            .start_checkout(player_id, payment_id, config)
            .await
    }

    pub async fn update_event(
        &self,
        event_id: &str,
        association_id: &str,
        changes: EventChanges,
    ) -> Result<Event, BookingError> {
        self.lifecycle
            .update_event(event_id, association_id, changes)
            .await
    }

    pub async fn cancel_event(
        &self,
        event_id: &str,
        association_id: &str,
    ) -> Result<Event, BookingError> {
        self.lifecycle.cancel_event(event_id, association_id).await
    }
}
