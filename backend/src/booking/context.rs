use crate::{
    db::{
        models::{Event, Payment, Registration},
        queries, DbPool,
    },
    payments::PaymentGateway,
    ws::Notifier,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::error::BookingError;

/// Shared collaborators of the booking services.
pub(crate) struct BookingContext {
    pub(crate) pool: DbPool,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) gateway: Arc<dyn PaymentGateway>,
    /// Commission added to every admission, in cents.
    pub(crate) service_fee: i64,
    /// One lock per event; held while seats or payments of that event change.
    event_locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl BookingContext {
    pub(crate) fn new(
        pool: DbPool,
        notifier: Arc<dyn Notifier>,
        gateway: Arc<dyn PaymentGateway>,
        service_fee: i64,
    ) -> Self {
        Self {
            pool,
            notifier,
            gateway,
            service_fee,
            event_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Serialise seat and payment changes for one event within this process.
    pub(crate) async fn lock_event(&self, event_id: &str) -> OwnedMutexGuard<()> {
        let existing = self.event_locks.read().await.get(event_id).cloned();
        let lock = match existing {
            Some(lock) => lock,
            None => self
                .event_locks
                .write()
                .await
                .entry(event_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone(),
        };
        lock.lock_owned().await
    }

    /// Drop the locks of events nobody holds or waits on. Returns how many
    /// were dropped.
    pub(crate) async fn prune_event_locks(&self) -> usize {
        let mut locks = self.event_locks.write().await;
        let before = locks.len();
        // Holders and waiters each keep a clone of the Arc.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    pub(crate) async fn load_event(&self, event_id: &str) -> Result<Event, BookingError> {
        queries::find_event(&self.pool, event_id)
            .await?
            .ok_or(BookingError::EventNotFound)
    }

    pub(crate) async fn load_registration(
        &self,
        registration_id: &str,
    ) -> Result<Registration, BookingError> {
        queries::find_registration(&self.pool, registration_id)
            .await?
            .ok_or(BookingError::RegistrationNotFound)
    }

    pub(crate) async fn load_payment(&self, payment_id: &str) -> Result<Payment, BookingError> {
        queries::find_payment(&self.pool, payment_id)
            .await?
            .ok_or(BookingError::PaymentNotFound)
    }
}

/// Put a `full` event back to `active` once a seat is free again.
pub(crate) async fn reopen_if_seat_freed(
    db: impl sqlx::SqliteExecutor<'_>,
    event_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE events SET status = 'active'
         WHERE id = ? AND status = 'full'
           AND (SELECT COUNT(*) FROM registrations
                WHERE event_id = events.id AND status = 'validated') < capacity",
    )
    .bind(event_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark an `active` event `full` once every seat is taken.
pub(crate) async fn close_if_filled(
    db: impl sqlx::SqliteExecutor<'_>,
    event_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE events SET status = 'full'
         WHERE id = ? AND status = 'active'
           AND (SELECT COUNT(*) FROM registrations
                WHERE event_id = events.id AND status = 'validated') >= capacity",
    )
    .bind(event_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}
