use crate::{
    api::{require_organizer, required, AppState},
    audit,
    booking::BlockedRegistration,
    db::{
        models::{Association, Ban, Role},
        queries,
    },
    error::{AppError, Result},
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct UpdateAssociationRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub player_id: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BanResponse {
    pub ban: Ban,
    pub blocked_registrations: Vec<BlockedRegistration>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct BanEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub ban: Ban,
    pub player_name: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", put(update_own_association))
        .route("/me/bans", post(ban_player).get(list_bans))
        .route("/me/bans/:player_id", delete(lift_ban))
        .route("/:id", get(get_association))
}

async fn get_association(
    State(state): State<Arc<AppState>>,
    Path(association_id): Path<String>,
) -> Result<Json<Association>> {
    let association = queries::find_association(&state.pool, &association_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Association not found".to_string()))?;

    Ok(Json(association))
}

async fn update_own_association(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateAssociationRequest>,
) -> Result<Json<Association>> {
    let (_, mut association) = require_organizer(&state, &headers).await?;

    if let Some(name) = req.name {
        association.name = required(&name, "Name")?;
    }
    if let Some(description) = req.description {
        association.description = Some(description);
    }
    if let Some(logo_url) = req.logo_url {
        association.logo_url = Some(logo_url);
    }

    sqlx::query("UPDATE associations SET name = ?, description = ?, logo_url = ? WHERE id = ?")
        .bind(&association.name)
        .bind(&association.description)
        .bind(&association.logo_url)
        .bind(&association.id)
        .execute(&state.pool)
        .await?;

    Ok(Json(association))
}

async fn ban_player(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<BanRequest>,
) -> Result<(StatusCode, Json<BanResponse>)> {
    let (_, association) = require_organizer(&state, &headers).await?;
    let reason = required(&req.reason, "Reason")?;

    let player = queries::find_user(&state.pool, &req.player_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Player not found".to_string()))?;
    if player.role != Role::Player {
        return Err(AppError::Validation("Only players can be banned".to_string()));
    }

    let (ban, blocked_registrations) = state
        .bookings
        .ban_player(&association.id, &player.id, &reason)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BanResponse {
            ban,
            blocked_registrations,
        }),
    ))
}

async fn list_bans(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BanEntry>>> {
    let (_, association) = require_organizer(&state, &headers).await?;

    let bans: Vec<BanEntry> = sqlx::query_as(
        "SELECT b.*, u.name AS player_name
         FROM bans b
         JOIN users u ON u.id = b.player_id
         WHERE b.association_id = ?
         ORDER BY b.created_at DESC",
    )
    .bind(&association.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(bans))
}

/// Lifting a ban allows new registrations; blocked ones stay blocked.
async fn lift_ban(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(player_id): Path<String>,
) -> Result<StatusCode> {
    let (_, association) = require_organizer(&state, &headers).await?;

    let result = sqlx::query("DELETE FROM bans WHERE player_id = ? AND association_id = ?")
        .bind(&player_id)
        .bind(&association.id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Ban not found".to_string()));
    }

    audit::log_moderation_event(&association.id, &player_id, "lift_ban", "");

    Ok(StatusCode::NO_CONTENT)
}
