use crate::{
    api::{require_organizer, required, AppState},
    db::{models::Terrain, queries},
    error::{AppError, Result},
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

const MAX_IMAGES_PER_TERRAIN: usize = 20;

#[derive(Debug, Deserialize)]
pub struct CreateTerrainRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTerrainRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_terrains).post(create_terrain))
        .route("/association", get(list_own_terrains))
        .route("/:id", put(update_terrain).delete(delete_terrain))
}

fn validate_images(images: &[String]) -> Result<()> {
    if images.len() > MAX_IMAGES_PER_TERRAIN {
        return Err(AppError::Validation(format!(
            "A terrain can have at most {} images",
            MAX_IMAGES_PER_TERRAIN
        )));
    }
    if images
        .iter()
        .any(|url| !(url.starts_with("http://") || url.starts_with("https://")))
    {
        return Err(AppError::Validation(
            "Image URLs must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

async fn list_terrains(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Terrain>>> {
    let terrains: Vec<Terrain> = sqlx::query_as("SELECT * FROM terrains ORDER BY name")
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(terrains))
}

async fn list_own_terrains(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Terrain>>> {
    let (_, association) = require_organizer(&state, &headers).await?;

    let terrains: Vec<Terrain> =
        sqlx::query_as("SELECT * FROM terrains WHERE association_id = ? ORDER BY name")
            .bind(&association.id)
            .fetch_all(&state.pool)
            .await?;

    Ok(Json(terrains))
}

async fn create_terrain(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateTerrainRequest>,
) -> Result<(StatusCode, Json<Terrain>)> {
    let (_, association) = require_organizer(&state, &headers).await?;

    let name = required(&req.name, "Name")?;
    validate_images(&req.images)?;

    let terrain = Terrain::new(association.id, name, req.description, req.images);

    sqlx::query(
        "INSERT INTO terrains (id, association_id, name, description, images, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&terrain.id)
    .bind(&terrain.association_id)
    .bind(&terrain.name)
    .bind(&terrain.description)
    .bind(sqlx::types::Json(&terrain.images))
    .bind(&terrain.created_at)
    .execute(&state.pool)
    .await?;

    tracing::info!("Terrain {} created by association {}", terrain.id, terrain.association_id);

    Ok((StatusCode::CREATED, Json(terrain)))
}

/// Load a terrain and check it belongs to the caller's association.
async fn owned_terrain(state: &AppState, terrain_id: &str, association_id: &str) -> Result<Terrain> {
    let terrain = queries::find_terrain(&state.pool, terrain_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Terrain not found".to_string()))?;

    if terrain.association_id != association_id {
        return Err(AppError::Forbidden(
            "This terrain belongs to another association".to_string(),
        ));
    }

    Ok(terrain)
}

async fn update_terrain(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(terrain_id): Path<String>,
    Json(req): Json<UpdateTerrainRequest>,
) -> Result<Json<Terrain>> {
    let (_, association) = require_organizer(&state, &headers).await?;
    let mut terrain = owned_terrain(&state, &terrain_id, &association.id).await?;

    if let Some(name) = req.name {
        terrain.name = required(&name, "Name")?;
    }
    if let Some(description) = req.description {
        terrain.description = Some(description);
    }
    if let Some(images) = req.images {
        validate_images(&images)?;
        terrain.images = images;
    }

    sqlx::query("UPDATE terrains SET name = ?, description = ?, images = ? WHERE id = ?")
        .bind(&terrain.name)
        .bind(&terrain.description)
        .bind(sqlx::types::Json(&terrain.images))
        .bind(&terrain.id)
        .execute(&state.pool)
        .await?;

    Ok(Json(terrain))
}

async fn delete_terrain(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(terrain_id): Path<String>,
) -> Result<StatusCode> {
    let (_, association) = require_organizer(&state, &headers).await?;
    let terrain = owned_terrain(&state, &terrain_id, &association.id).await?;

    let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE terrain_id = ?")
        .bind(&terrain.id)
        .fetch_one(&state.pool)
        .await?;

    if events > 0 {
        return Err(AppError::Conflict(format!(
            "Terrain is used by {} event(s)",
            events
        )));
    }

    sqlx::query("DELETE FROM terrains WHERE id = ?")
        .bind(&terrain.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("Terrain {} deleted", terrain.id);

    Ok(StatusCode::NO_CONTENT)
}
