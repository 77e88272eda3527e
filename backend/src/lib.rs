//! Event Booking Server Library
//!
//! This module exposes the server components for integration testing.

pub mod api;
pub mod audit;
pub mod auth;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod payments;
pub mod ws;

use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Wire the shared state together.
pub fn build_state(
    pool: db::DbPool,
    jwt_manager: Arc<auth::JwtManager>,
    hasher: auth::PasswordHasher,
    gateway: Arc<dyn payments::PaymentGateway>,
    payments: config::PaymentConfig,
    service_fee: i64,
) -> Arc<api::AppState> {
    let hub = Arc::new(ws::NotificationHub::new());
    let bookings = Arc::new(booking::BookingManager::new(
        pool.clone(),
        hub.clone(),
        gateway,
        service_fee,
    ));

    Arc::new(api::AppState {
        pool,
        jwt_manager,
        hasher,
        hub,
        bookings,
        payments,
    })
}

/// Creates the application router with all endpoints
pub fn create_app(state: Arc<api::AppState>, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    }
    .allow_methods(Any)
    .allow_headers(Any);

    let api = Router::new()
        .nest("/auth", api::auth::router())
        .nest("/terrains", api::terrains::router())
        .nest("/events", api::events::router())
        .nest("/registrations", api::registrations::router())
        .nest("/payments", api::payments::router())
        .nest("/messages", api::messages::router())
        .nest("/associations", api::associations::router());

    Router::new()
        .route("/", get(|| async { "Event Booking Server" }))
        .route("/health", get(|| async { "OK" }))
        .route("/ws", get(ws::ws_handler))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Test helper to create an in-memory database and run migrations
pub async fn create_test_db() -> db::DbPool {
    // A single connection keeps every query on the same in-memory database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Test helper to create a fully configured test app
pub async fn create_test_app() -> (Router, Arc<api::AppState>) {
    create_test_app_with_gateway(Arc::new(payments::MockPaymentGateway::new())).await
}

/// Same as [`create_test_app`] with a caller-controlled payment gateway.
pub async fn create_test_app_with_gateway(
    gateway: Arc<dyn payments::PaymentGateway>,
) -> (Router, Arc<api::AppState>) {
    let pool = create_test_db().await;
    let jwt_manager = Arc::new(auth::JwtManager::new("test_secret_key".to_string(), 1));

    let state = build_state(
        pool,
        jwt_manager,
        auth::PasswordHasher::new(4),
        gateway,
        config::PaymentConfig::for_tests(),
        config::DEFAULT_SERVICE_FEE_CENTS,
    );

    let app = create_app(state.clone(), &[]);
    (app, state)
}
