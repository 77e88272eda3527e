use crate::{
    api::{require_organizer, require_player, AppState},
    booking::{Admission, Cancellation},
    db::{
        models::{EventStatus, PaymentStatus, Registration},
        queries,
    },
    error::{AppError, Result},
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub event_id: String,
}

/// A player's registration with the event and payment it is tied to.
#[derive(Debug, Serialize, FromRow)]
pub struct PlayerRegistration {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub registration: Registration,
    pub event_name: String,
    pub event_starts_at: DateTime<Utc>,
    pub event_status: EventStatus,
    pub amount: i64,
    pub commission: i64,
    pub payment_status: PaymentStatus,
}

/// A registration as seen by the organizer of the event.
#[derive(Debug, Serialize, FromRow)]
pub struct Registrant {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub registration: Registration,
    pub player_name: String,
    pub player_email: String,
    pub payment_status: PaymentStatus,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(register))
        .route("/:id/cancel", post(cancel_registration))
        .route("/joueur", get(list_own_registrations))
        .route("/event/:event_id", get(list_event_registrations))
}

async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Admission>)> {
    let player = require_player(&state, &headers).await?;

    let admission = state.bookings.register(&player.id, &req.event_id).await?;

    Ok((StatusCode::CREATED, Json(admission)))
}

async fn cancel_registration(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(registration_id): Path<String>,
) -> Result<Json<Cancellation>> {
    let player = require_player(&state, &headers).await?;

    let cancellation = state
        .bookings
        .cancel_registration(&player.id, &registration_id)
        .await?;

    Ok(Json(cancellation))
}

async fn list_own_registrations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PlayerRegistration>>> {
    let player = require_player(&state, &headers).await?;

    let registrations: Vec<PlayerRegistration> = sqlx::query_as(
        "SELECT r.*,
                e.name AS event_name,
                e.starts_at AS event_starts_at,
                e.status AS event_status,
                p.amount AS amount,
                p.commission AS commission,
                p.status AS payment_status
         FROM registrations r
         JOIN events e ON e.id = r.event_id
         JOIN payments p ON p.id = r.payment_id
         WHERE r.player_id = ?
         ORDER BY e.starts_at",
    )
    .bind(&player.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(registrations))
}

async fn list_event_registrations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<Registrant>>> {
    let (_, association) = require_organizer(&state, &headers).await?;

    let event = queries::find_event(&state.pool, &event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if event.association_id != association.id {
        return Err(AppError::Forbidden(
            "This event belongs to another association".to_string(),
        ));
    }

    let registrants: Vec<Registrant> = sqlx::query_as(
        "SELECT r.*,
                u.name AS player_name,
                u.email AS player_email,
                p.status AS payment_status
         FROM registrations r
         JOIN users u ON u.id = r.player_id
         JOIN payments p ON p.id = r.payment_id
         WHERE r.event_id = ?
         ORDER BY r.created_at",
    )
    .bind(&event.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(registrants))
}
