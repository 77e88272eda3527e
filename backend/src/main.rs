use booking_server::{auth, build_state, config, create_app, db, payments};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load config
    let config = config::Config::from_env();
    tracing::info!("Starting booking server on {}", config.server_addr());

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    db::run_migrations(&pool).await?;

    let jwt_manager = Arc::new(auth::JwtManager::new(
        config.jwt_secret.clone(),
        config.jwt_expiration_hours,
    ));

    let gateway = payments::gateway_from_config(&config.payments)?;
    if config.payments.stripe_enabled() {
        tracing::info!("Payments go through Stripe ({})", config.payments.currency);
    }

    let state = build_state(
        pool,
        jwt_manager,
        auth::PasswordHasher::new(config.bcrypt_cost),
        gateway,
        config.payments.clone(),
        config.service_fee_cents,
    );

    // Prune notification rooms and event locks nobody uses any more
    let hub = state.hub.clone();
    let bookings = state.bookings.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            hub.prune().await;
            let released = bookings.prune_idle_locks().await;
            if released > 0 {
                tracing::debug!("Released {} idle event locks", released);
            }
        }
    });

    let app = create_app(state, &config.cors_allowed_origins);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server_addr()).await?;
    tracing::info!("Server listening on {}", config.server_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
