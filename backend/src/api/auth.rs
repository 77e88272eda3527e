use crate::{
    api::{current_user, required, AppState},
    audit,
    auth::password::{validate_password, PasswordHash},
    db::{
        models::{Association, Role, User},
        queries,
    },
    error::{AppError, Result},
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    /// Organizers only; defaults to the account name.
    pub association_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    pub association: Option<Association>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub association: Option<Association>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let name = required(&req.name, "Name")?;
    let email = required(&req.email, "Email")?.to_lowercase();
    if !email.contains('@') {
        return Err(AppError::Validation("Email address is invalid".to_string()));
    }
    if let Err(msg) = validate_password(&req.password) {
        return Err(AppError::Validation(msg));
    }

    if queries::find_user_by_email(&state.pool, &email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = state.hasher.hash(&req.password)?;
    let user = User::new(name, email, password_hash, req.role);

    // Every organizer account runs exactly one association.
    let association = match user.role {
        Role::Organizer => {
            let association_name = match req.association_name.as_deref() {
                Some(n) if !n.trim().is_empty() => n.trim().to_string(),
                _ => user.name.clone(),
            };
            Some(Association::new(user.id.clone(), association_name))
        }
        Role::Player => None,
    };

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, blocked, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role)
    .bind(user.blocked)
    .bind(&user.created_at)
    .execute(&mut *tx)
    .await?;

    if let Some(association) = &association {
        sqlx::query(
            "INSERT INTO associations (id, user_id, name, description, logo_url, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&association.id)
        .bind(&association.user_id)
        .bind(&association.name)
        .bind(&association.description)
        .bind(&association.logo_url)
        .bind(&association.created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    audit::log_auth_event(&user.email, "register", true);

    let token = state.jwt_manager.create_token(user.id.clone(), user.role)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user,
            association,
        }),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let user = queries::find_user_by_email(&state.pool, req.email.trim()).await?;

    // Timing-safe: always run bcrypt even when the account does not exist
    let user = match user {
        Some(u) => {
            let valid = PasswordHash::from_stored(u.password_hash.clone()).verify(&req.password)?;
            valid.then_some(u)
        }
        None => {
            PasswordHash::verify_dummy(&req.password);
            None
        }
    };

    let Some(user) = user else {
        audit::log_auth_event(&req.email, "login_failed", false);
        return Err(AppError::Auth("Invalid email or password".to_string()));
    };

    if user.blocked {
        audit::log_auth_event(&user.email, "login_blocked", false);
        return Err(AppError::Forbidden("This account is blocked".to_string()));
    }

    audit::log_auth_event(&user.email, "login", true);

    let association = queries::find_association_by_user(&state.pool, &user.id).await?;
    let token = state.jwt_manager.create_token(user.id.clone(), user.role)?;

    Ok(Json(AuthResponse {
        token,
        user,
        association,
    }))
}

async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>> {
    let user = current_user(&state, &headers).await?;
    let association = queries::find_association_by_user(&state.pool, &user.id).await?;

    Ok(Json(ProfileResponse { user, association }))
}
