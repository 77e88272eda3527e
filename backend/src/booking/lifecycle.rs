use crate::{
    audit,
    db::{
        models::{Event, EventStatus, Recurrence},
        queries,
    },
    ws::messages::{EventRef, ServerMessage},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{context::BookingContext, error::BookingError};

/// Fields an organizer may change on an event. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct EventChanges {
    pub terrain_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
    pub price: Option<i64>,
    pub capacity: Option<i64>,
}

/// Status implied by the seats taken, for an event that is not cancelled.
pub fn derive_status(taken: i64, capacity: i64) -> EventStatus {
    if taken >= capacity {
        EventStatus::Full
    } else {
        EventStatus::Active
    }
}

pub(crate) struct EventLifecycle {
    ctx: Arc<BookingContext>,
}

impl EventLifecycle {
    pub(crate) fn new(ctx: Arc<BookingContext>) -> Self {
        Self { ctx }
    }

    /// Apply organizer changes. A capacity change re-derives active/full.
    pub(crate) async fn update_event(
        &self,
        event_id: &str,
        association_id: &str,
        changes: EventChanges,
    ) -> Result<Event, BookingError> {
        let _guard = self.ctx.lock_event(event_id).await;

        let mut event = self.ctx.load_event(event_id).await?;
        if event.association_id != association_id {
            return Err(BookingError::NotOwner);
        }
        if event.status == EventStatus::Cancelled {
            return Err(BookingError::EventUnavailable);
        }

        let taken = queries::count_validated_registrations(&self.ctx.pool, &event.id).await?;
        if let Some(capacity) = changes.capacity {
            if capacity < taken {
                return Err(BookingError::CapacityBelowRegistrations { taken });
            }
            event.capacity = capacity;
        }

        if let Some(terrain_id) = changes.terrain_id {
            event.terrain_id = terrain_id;
        }
        if let Some(name) = changes.name {
            event.name = name;
        }
        if let Some(description) = changes.description {
            event.description = Some(description);
        }
        if let Some(starts_at) = changes.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = changes.ends_at {
            event.ends_at = ends_at;
        }
        if let Some(recurrence) = changes.recurrence {
            event.recurrence = recurrence;
        }
        if let Some(price) = changes.price {
            event.price = price;
        }

        event.status = derive_status(taken, event.capacity);

        sqlx::query(
            "UPDATE events
             SET terrain_id = ?, name = ?, description = ?, starts_at = ?, ends_at = ?,
                 recurrence = ?, price = ?, capacity = ?, status = ?
             WHERE id = ? AND status != 'cancelled'",
        )
        .bind(&event.terrain_id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(event.recurrence)
        .bind(event.price)
        .bind(event.capacity)
        .bind(event.status)
        .bind(&event.id)
        .execute(&self.ctx.pool)
        .await?;

        tracing::info!(
            "Event {} updated (capacity {}, status {})",
            event.id,
            event.capacity,
            event.status.as_str()
        );

        Ok(event)
    }

    /// Cancel an event. Registrations and payments are left as they are;
    /// the room and every validated registrant are notified.
    pub(crate) async fn cancel_event(
        &self,
        event_id: &str,
        association_id: &str,
    ) -> Result<Event, BookingError> {
        let _guard = self.ctx.lock_event(event_id).await;

        let mut event = self.ctx.load_event(event_id).await?;
        if event.association_id != association_id {
            return Err(BookingError::NotOwner);
        }

        let result = sqlx::query(
            "UPDATE events SET status = 'cancelled' WHERE id = ? AND status != 'cancelled'",
        )
        .bind(&event.id)
        .execute(&self.ctx.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BookingError::EventUnavailable);
        }
        event.status = EventStatus::Cancelled;

        let registrants: Vec<String> = sqlx::query_scalar(
            "SELECT player_id FROM registrations WHERE event_id = ? AND status = 'validated'",
        )
        .bind(&event.id)
        .fetch_all(&self.ctx.pool)
        .await?;

        tracing::info!(
            "Event {} cancelled; notifying {} registrants",
            event.id,
            registrants.len()
        );
        audit::log_event_lifecycle(&event.id, "cancelled", association_id);

        let notice = ServerMessage::EventCancelled {
            event: EventRef {
                id: event.id.clone(),
                name: event.name.clone(),
            },
        };

        self.ctx
            .notifier
            .publish_to_event(&event.id, notice.clone())
            .await;
        for player_id in &registrants {
            self.ctx
                .notifier
                .publish_to_user(player_id, notice.clone())
                .await;
        }

        Ok(event)
    }
}
