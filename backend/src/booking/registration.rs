use crate::{
    audit,
    db::{
        models::{
            Ban, Event, EventStatus, Payment, PaymentStatus, Registration, RegistrationStatus,
        },
        queries,
    },
    ws::messages::{EventRef, ServerMessage},
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{
    context::{close_if_filled, reopen_if_seat_freed, BookingContext},
    error::BookingError,
};

/// Registrations can be cancelled up to this many hours before the start.
pub const CANCELLATION_LEAD_HOURS: i64 = 24;

/// Reads of the linked payment before a cancellation gives up.
const CANCEL_ATTEMPTS: usize = 2;

/// Outcome of a successful admission.
#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    pub registration: Registration,
    pub payment: Payment,
    /// This admission took the last seat.
    pub event_full: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cancellation {
    pub registration: Registration,
    pub payment: Payment,
    /// Processor refund id when the payment had settled.
    pub refund_id: Option<String>,
}

/// A registration set aside because its player was banned.
#[derive(Debug, Clone, Serialize)]
pub struct BlockedRegistration {
    pub registration_id: String,
    pub event_id: String,
    pub event_name: String,
}

/// True while a registration for an event starting at `starts_at` may still
/// be cancelled.
pub fn cancellation_window_open(starts_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now < starts_at - Duration::hours(CANCELLATION_LEAD_HOURS)
}

pub(crate) struct RegistrationService {
    ctx: Arc<BookingContext>,
}

impl RegistrationService {
    pub(crate) fn new(ctx: Arc<BookingContext>) -> Self {
        Self { ctx }
    }

    /// Admit a player: one pending payment and one validated registration,
    /// or nothing.
    pub(crate) async fn admit(
        &self,
        player_id: &str,
        event_id: &str,
    ) -> Result<Admission, BookingError> {
        let _guard = self.ctx.lock_event(event_id).await;

        let event = self.ctx.load_event(event_id).await?;
        self.check_admissible(player_id, &event).await?;

        let payment = Payment::new(
            player_id.to_string(),
            event.id.clone(),
            event.price,
            self.ctx.service_fee,
        );
        let registration =
            Registration::new(player_id.to_string(), event.id.clone(), payment.id.clone());

        let mut tx = self.ctx.pool.begin().await?;

        // Writing first takes the database write lock up front.
        sqlx::query(
            "INSERT INTO payments (id, player_id, event_id, amount, commission, status, external_ref, checkout_session_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&payment.id)
        .bind(&payment.player_id)
        .bind(&payment.event_id)
        .bind(payment.amount)
        .bind(payment.commission)
        .bind(payment.status)
        .bind(&payment.external_ref)
        .bind(&payment.checkout_session_id)
        .bind(&payment.created_at)
        .bind(&payment.updated_at)
        .execute(&mut *tx)
        .await?;

        // Status, duplicate and capacity are checked again by the insert itself.
        let inserted = sqlx::query(
            "INSERT INTO registrations (id, player_id, event_id, payment_id, status, created_at)
             SELECT ?, ?, ?, ?, 'validated', ?
             WHERE EXISTS (SELECT 1 FROM events WHERE id = ? AND status = 'active')
               AND NOT EXISTS (
                   SELECT 1 FROM registrations
                   WHERE player_id = ? AND event_id = ? AND status != 'cancelled')
               AND (SELECT COUNT(*) FROM registrations WHERE event_id = ? AND status = 'validated')
                   < (SELECT capacity FROM events WHERE id = ?)",
        )
        .bind(&registration.id)
        .bind(&registration.player_id)
        .bind(&registration.event_id)
        .bind(&registration.payment_id)
        .bind(&registration.created_at)
        .bind(&event.id)
        .bind(player_id)
        .bind(&event.id)
        .bind(&event.id)
        .bind(&event.id)
        .execute(&mut *tx)
        .await;

        let inserted = match inserted {
            Ok(result) => result.rows_affected(),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => 0,
            Err(e) => return Err(e.into()),
        };

        if inserted == 0 {
            tx.rollback().await?;
            let event = self.ctx.load_event(event_id).await?;
            return Err(self
                .check_admissible(player_id, &event)
                .await
                .err()
                .unwrap_or(BookingError::CapacityExceeded));
        }

        let event_full = close_if_filled(&mut *tx, &event.id).await?;
        tx.commit().await?;

        tracing::info!(
            "Player {} registered for event {} (registration {}, payment {})",
            player_id,
            event.id,
            registration.id,
            payment.id
        );
        audit::log_registration_event(&registration.id, player_id, &event.id, "admitted");
        if event_full {
            tracing::info!("Event {} is now full", event.id);
        }

        Ok(Admission {
            registration,
            payment,
            event_full,
        })
    }

    async fn check_admissible(&self, player_id: &str, event: &Event) -> Result<(), BookingError> {
        match event.status {
            EventStatus::Active => {}
            EventStatus::Full => return Err(BookingError::CapacityExceeded),
            EventStatus::Cancelled => return Err(BookingError::EventUnavailable),
        }

        if queries::find_ban(&self.ctx.pool, player_id, &event.association_id)
            .await?
            .is_some()
        {
            return Err(BookingError::PlayerBanned);
        }

        if queries::find_live_registration(&self.ctx.pool, player_id, &event.id)
            .await?
            .is_some()
        {
            return Err(BookingError::AlreadyRegistered);
        }

        let taken = queries::count_validated_registrations(&self.ctx.pool, &event.id).await?;
        if taken >= event.capacity {
            return Err(BookingError::CapacityExceeded);
        }

        Ok(())
    }

    /// Cancel a player's own registration and refund its payment.
    pub(crate) async fn cancel(
        &self,
        player_id: &str,
        registration_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Cancellation, BookingError> {
        let registration = self.ctx.load_registration(registration_id).await?;
        if registration.player_id != player_id {
            return Err(BookingError::NotOwner);
        }

        let _guard = self.ctx.lock_event(&registration.event_id).await;

        // Reload under the lock so a concurrent cancel is seen.
        let mut registration = self.ctx.load_registration(registration_id).await?;
        if registration.status != RegistrationStatus::Validated {
            return Err(BookingError::InvalidRegistrationState {
                actual: registration.status,
            });
        }

        let event = self.ctx.load_event(&registration.event_id).await?;
        if !cancellation_window_open(event.starts_at, now) {
            return Err(BookingError::CancellationWindowClosed {
                lead_hours: CANCELLATION_LEAD_HOURS,
            });
        }

        let mut refund_id = None;
        for _ in 0..CANCEL_ATTEMPTS {
            let mut payment = self.ctx.load_payment(&registration.payment_id).await?;
            let seen = payment.status;

            // Captured funds go back through the processor before any write.
            if seen == PaymentStatus::Paid && refund_id.is_none() {
                let external_ref =
                    payment
                        .external_ref
                        .as_deref()
                        .ok_or(BookingError::InvalidPaymentState {
                            expected: PaymentStatus::Paid,
                            actual: seen,
                        })?;
                refund_id = Some(self.ctx.gateway.refund(external_ref, payment.total()).await?);
            }

            let updated_at = now.to_rfc3339();
            let mut tx = self.ctx.pool.begin().await?;

            let cancelled = sqlx::query(
                "UPDATE registrations SET status = 'cancelled' WHERE id = ? AND status = 'validated'",
            )
            .bind(&registration.id)
            .execute(&mut *tx)
            .await?;

            if cancelled.rows_affected() == 0 {
                tx.rollback().await?;
                if let Some(refund_id) = &refund_id {
                    tracing::error!(
                        "Refund {} issued for payment {} but the cancellation lost a race; reconcile manually",
                        refund_id,
                        payment.id
                    );
                }
                let current = self.ctx.load_registration(registration_id).await?;
                return Err(BookingError::InvalidRegistrationState {
                    actual: current.status,
                });
            }

            // A payment the organizer already refunded needs no further change.
            if seen != PaymentStatus::Refunded {
                let refunded = sqlx::query(
                    "UPDATE payments SET status = 'refunded', updated_at = ? WHERE id = ? AND status = ?",
                )
                .bind(&updated_at)
                .bind(&payment.id)
                .bind(seen)
                .execute(&mut *tx)
                .await?;

                if refunded.rows_affected() == 0 {
                    tx.rollback().await?;
                    tracing::warn!(
                        "Payment {} moved away from {} during cancellation of {}; reading it again",
                        payment.id,
                        seen.as_str(),
                        registration.id
                    );
                    continue;
                }

                payment.status = PaymentStatus::Refunded;
                payment.updated_at = updated_at;
            }

            reopen_if_seat_freed(&mut *tx, &event.id).await?;
            tx.commit().await?;

            registration.status = RegistrationStatus::Cancelled;

            tracing::info!(
                "Player {} cancelled registration {} for event {}",
                player_id,
                registration.id,
                event.id
            );
            audit::log_registration_event(&registration.id, player_id, &event.id, "cancelled");
            if seen != PaymentStatus::Refunded {
                audit::log_payment_event(
                    &payment.id,
                    "refunded_on_cancellation",
                    Some(payment.total()),
                );
            }

            return Ok(Cancellation {
                registration,
                payment,
                refund_id,
            });
        }

        if let Some(refund_id) = &refund_id {
            tracing::error!(
                "Refund {} issued for registration {} but its payment kept changing; reconcile manually",
                refund_id,
                registration.id
            );
        }
        Err(BookingError::PaymentChanged)
    }

    /// Record a ban and block the player's validated registrations on the
    /// association's events that have not started yet.
    pub(crate) async fn ban_player(
        &self,
        association_id: &str,
        player_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Ban, Vec<BlockedRegistration>), BookingError> {
        let ban = Ban::new(
            player_id.to_string(),
            association_id.to_string(),
            reason.to_string(),
        );

        let mut tx = self.ctx.pool.begin().await?;

        sqlx::query(
            "INSERT INTO bans (id, player_id, association_id, reason, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (player_id, association_id) DO UPDATE SET reason = excluded.reason",
        )
        .bind(&ban.id)
        .bind(&ban.player_id)
        .bind(&ban.association_id)
        .bind(&ban.reason)
        .bind(&ban.created_at)
        .execute(&mut *tx)
        .await?;

        let candidates: Vec<(String, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT r.id, e.id, e.name, e.starts_at
             FROM registrations r
             JOIN events e ON e.id = r.event_id
             WHERE r.player_id = ? AND e.association_id = ? AND r.status = 'validated'",
        )
        .bind(player_id)
        .bind(association_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut blocked = Vec::new();
        for (registration_id, event_id, event_name, starts_at) in candidates {
            if starts_at <= now {
                continue;
            }

            sqlx::query(
                "UPDATE registrations SET status = 'blocked' WHERE id = ? AND status = 'validated'",
            )
            .bind(&registration_id)
            .execute(&mut *tx)
            .await?;
            reopen_if_seat_freed(&mut *tx, &event_id).await?;

            blocked.push(BlockedRegistration {
                registration_id,
                event_id,
                event_name,
            });
        }

        tx.commit().await?;

        // Ban rows are upserted; report what is stored.
        let ban = queries::find_ban(&self.ctx.pool, player_id, association_id)
            .await?
            .unwrap_or(ban);

        audit::log_moderation_event(association_id, player_id, "ban", reason);

        for entry in &blocked {
            tracing::info!(
                "Registration {} of player {} blocked for event {}",
                entry.registration_id,
                player_id,
                entry.event_id
            );
            self.ctx
                .notifier
                .publish_to_user(
                    player_id,
                    ServerMessage::RegistrationBlocked {
                        event: EventRef {
                            id: entry.event_id.clone(),
                            name: entry.event_name.clone(),
                        },
                        reason: reason.to_string(),
                    },
                )
                .await;
        }

        Ok((ban, blocked))
    }
}
