//! Explicit lookups shared by the API handlers and the booking services.
//!
//! Relations are resolved here by foreign key rather than through model
//! objects, so every caller sees exactly which rows it reads.

use sqlx::SqliteExecutor;

use super::models::{Association, Ban, Event, Payment, Registration, Terrain, User};

pub async fn find_user(
    db: impl SqliteExecutor<'_>,
    user_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await
}

pub async fn find_user_by_email(
    db: impl SqliteExecutor<'_>,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER(?)")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn find_association(
    db: impl SqliteExecutor<'_>,
    association_id: &str,
) -> Result<Option<Association>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM associations WHERE id = ?")
        .bind(association_id)
        .fetch_optional(db)
        .await
}

pub async fn find_association_by_user(
    db: impl SqliteExecutor<'_>,
    user_id: &str,
) -> Result<Option<Association>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM associations WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await
}

pub async fn find_terrain(
    db: impl SqliteExecutor<'_>,
    terrain_id: &str,
) -> Result<Option<Terrain>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM terrains WHERE id = ?")
        .bind(terrain_id)
        .fetch_optional(db)
        .await
}

pub async fn find_event(
    db: impl SqliteExecutor<'_>,
    event_id: &str,
) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(event_id)
        .fetch_optional(db)
        .await
}

pub async fn find_registration(
    db: impl SqliteExecutor<'_>,
    registration_id: &str,
) -> Result<Option<Registration>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM registrations WHERE id = ?")
        .bind(registration_id)
        .fetch_optional(db)
        .await
}

pub async fn find_registration_by_payment(
    db: impl SqliteExecutor<'_>,
    payment_id: &str,
) -> Result<Option<Registration>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM registrations WHERE payment_id = ?")
        .bind(payment_id)
        .fetch_optional(db)
        .await
}

/// The player's live (validated or blocked) registration for an event, if any.
pub async fn find_live_registration(
    db: impl SqliteExecutor<'_>,
    player_id: &str,
    event_id: &str,
) -> Result<Option<Registration>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM registrations WHERE player_id = ? AND event_id = ? AND status != 'cancelled'",
    )
    .bind(player_id)
    .bind(event_id)
    .fetch_optional(db)
    .await
}

pub async fn find_payment(
    db: impl SqliteExecutor<'_>,
    payment_id: &str,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE id = ?")
        .bind(payment_id)
        .fetch_optional(db)
        .await
}

pub async fn count_validated_registrations(
    db: impl SqliteExecutor<'_>,
    event_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM registrations WHERE event_id = ? AND status = 'validated'",
    )
    .bind(event_id)
    .fetch_one(db)
    .await
}

pub async fn find_ban(
    db: impl SqliteExecutor<'_>,
    player_id: &str,
    association_id: &str,
) -> Result<Option<Ban>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM bans WHERE player_id = ? AND association_id = ?")
        .bind(player_id)
        .bind(association_id)
        .fetch_optional(db)
        .await
}
