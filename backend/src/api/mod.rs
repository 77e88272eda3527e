pub mod associations;
pub mod auth;
pub mod events;
pub mod messages;
pub mod payments;
pub mod registrations;
pub mod terrains;

use crate::{
    auth::{AuthUser, JwtManager, PasswordHasher},
    booking::BookingManager,
    config::PaymentConfig,
    db::{
        models::{Association, Role, User},
        queries, DbPool,
    },
    error::{AppError, Result},
    ws::NotificationHub,
};
use axum::http::HeaderMap;
use std::sync::Arc;

pub struct AppState {
    pub pool: DbPool,
    pub jwt_manager: Arc<JwtManager>,
    pub hasher: PasswordHasher,
    pub hub: Arc<NotificationHub>,
    pub bookings: Arc<BookingManager>,
    pub payments: PaymentConfig,
}

/// Resolve the bearer token to a stored account that is not blocked.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    let auth_user = AuthUser::from_header(&state.jwt_manager, auth_header)?;

    let user = queries::find_user(&state.pool, &auth_user.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if user.blocked {
        crate::audit::log_security_event(&user.id, "blocked_account", "token rejected");
        return Err(AppError::Forbidden("This account is blocked".to_string()));
    }

    Ok(user)
}

pub async fn require_player(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let user = current_user(state, headers).await?;
    if user.role != Role::Player {
        return Err(AppError::Forbidden(
            "Only players can perform this action".to_string(),
        ));
    }
    Ok(user)
}

/// The organizer behind the token together with its association.
pub async fn require_organizer(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(User, Association)> {
    let user = current_user(state, headers).await?;
    if user.role != Role::Organizer {
        return Err(AppError::Forbidden(
            "Only organizers can perform this action".to_string(),
        ));
    }

    let association = queries::find_association_by_user(&state.pool, &user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Association not found".to_string()))?;

    Ok((user, association))
}

/// Trimmed value, or a validation error naming the field when it is blank.
pub(crate) fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}
