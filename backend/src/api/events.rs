use crate::{
    api::{require_organizer, required, AppState},
    audit,
    booking::EventChanges,
    db::{
        models::{Event, Recurrence},
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
pub struct CreateEventRequest {
    pub terrain_id: String,
    pub name: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
    pub price: i64,
    pub capacity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEventRequest {
    pub terrain_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
    pub price: Option<i64>,
    pub capacity: Option<i64>,
}

/// An event with its venue, organizer and seats taken.
#[derive(Debug, Serialize, FromRow)]
pub struct EventListing {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub event: Event,
    pub terrain_name: String,
    pub association_name: String,
    pub seats_taken: i64,
}

const LISTING_QUERY: &str = "SELECT e.*,
        t.name AS terrain_name,
        a.name AS association_name,
        (SELECT COUNT(*) FROM registrations r
         WHERE r.event_id = e.id AND r.status = 'validated') AS seats_taken
     FROM events e
     JOIN terrains t ON t.id = e.terrain_id
     JOIN associations a ON a.id = e.association_id";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/association", get(list_own_events))
        .route("/:id", get(get_event).put(update_event))
        .route("/:id/cancel", post(cancel_event))
}

fn validate_schedule(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<()> {
    if starts_at >= ends_at {
        return Err(AppError::Validation(
            "Event must end after it starts".to_string(),
        ));
    }
    Ok(())
}

fn validate_price(price: i64) -> Result<()> {
    if price < 0 {
        return Err(AppError::Validation("Price cannot be negative".to_string()));
    }
    Ok(())
}

fn validate_capacity(capacity: i64) -> Result<()> {
    if capacity < 1 {
        return Err(AppError::Validation(
            "Capacity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// The terrain must exist and belong to the organizer's association.
async fn check_terrain(state: &AppState, terrain_id: &str, association_id: &str) -> Result<()> {
    let terrain = queries::find_terrain(&state.pool, terrain_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Terrain not found".to_string()))?;

    if terrain.association_id != association_id {
        return Err(AppError::Forbidden(
            "This terrain belongs to another association".to_string(),
        ));
    }
    Ok(())
}

async fn list_events(State(state): State<Arc<AppState>>) -> Result<Json<Vec<EventListing>>> {
    let events: Vec<EventListing> = sqlx::query_as(&format!(
        "{} WHERE e.status = 'active' ORDER BY e.starts_at",
        LISTING_QUERY
    ))
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(events))
}

async fn list_own_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<EventListing>>> {
    let (_, association) = require_organizer(&state, &headers).await?;

    let events: Vec<EventListing> = sqlx::query_as(&format!(
        "{} WHERE e.association_id = ? ORDER BY e.starts_at",
        LISTING_QUERY
    ))
    .bind(&association.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(events))
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<Json<EventListing>> {
    let event: EventListing = sqlx::query_as(&format!("{} WHERE e.id = ?", LISTING_QUERY))
        .bind(&event_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    Ok(Json(event))
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>)> {
    let (_, association) = require_organizer(&state, &headers).await?;

    let name = required(&req.name, "Name")?;
    validate_schedule(req.starts_at, req.ends_at)?;
    validate_price(req.price)?;
    validate_capacity(req.capacity)?;
    check_terrain(&state, &req.terrain_id, &association.id).await?;

    let event = Event::new(
        association.id,
        req.terrain_id,
        name,
        req.description,
        req.starts_at,
        req.ends_at,
        req.recurrence.unwrap_or(Recurrence::OneOff),
        req.price,
        req.capacity,
    );

    sqlx::query(
        "INSERT INTO events (id, association_id, terrain_id, name, description, starts_at, ends_at, recurrence, price, capacity, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.id)
    .bind(&event.association_id)
    .bind(&event.terrain_id)
    .bind(&event.name)
    .bind(&event.description)
    .bind(event.starts_at)
    .bind(event.ends_at)
    .bind(event.recurrence)
    .bind(event.price)
    .bind(event.capacity)
    .bind(event.status)
    .bind(&event.created_at)
    .execute(&state.pool)
    .await?;

    tracing::info!(
        "Event {} created by association {} ({} seats)",
        event.id,
        event.association_id,
        event.capacity
    );
    audit::log_event_lifecycle(&event.id, "created", &event.association_id);

    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<Event>> {
    let (_, association) = require_organizer(&state, &headers).await?;

    let current = queries::find_event(&state.pool, &event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let name = req.name.as_deref().map(|n| required(n, "Name")).transpose()?;
    validate_schedule(
        req.starts_at.unwrap_or(current.starts_at),
        req.ends_at.unwrap_or(current.ends_at),
    )?;
    if let Some(price) = req.price {
        validate_price(price)?;
    }
    if let Some(capacity) = req.capacity {
        validate_capacity(capacity)?;
    }
    if let Some(terrain_id) = &req.terrain_id {
        check_terrain(&state, terrain_id, &association.id).await?;
    }

    let event = state
        .bookings
        .update_event(
            &event_id,
            &association.id,
            EventChanges {
                terrain_id: req.terrain_id,
                name,
                description: req.description,
                starts_at: req.starts_at,
                ends_at: req.ends_at,
                recurrence: req.recurrence,
                price: req.price,
                capacity: req.capacity,
            },
        )
        .await?;

    Ok(Json(event))
}

async fn cancel_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
) -> Result<Json<Event>> {
    let (_, association) = require_organizer(&state, &headers).await?;

    let event = state
        .bookings
        .cancel_event(&event_id, &association.id)
        .await?;

    Ok(Json(event))
}
