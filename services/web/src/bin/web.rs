//! services/web/src/bin/web.rs
//!
//! The web server: loads configuration, wires the adapters into `AppState`
//! and serves the router until Ctrl-C.

use reqwest::Client;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web_lib::{
    adapters::{DbAdapter, InMemoryRateLimiter, SupabaseAdminAdapter, SupabaseAuthAdapter},
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState},
};

/// How often expired rate-limit windows are dropped.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received, draining connections...");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let http = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;
    let auth_adapter = Arc::new(SupabaseAuthAdapter::new(http.clone(), &config));
    // The admin client cannot work without the service-role key; refuse to start.
    let admin_adapter = Arc::new(SupabaseAdminAdapter::from_config(http, &config)?);

    let cancel = CancellationToken::new();
    let rate_limiter = Arc::new(InMemoryRateLimiter::new());
    let sweeper = rate_limiter
        .clone()
        .spawn_sweeper(SWEEP_INTERVAL, cancel.clone());

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        auth: auth_adapter,
        admin: admin_adapter,
        profiles: db_adapter,
        rate_limiter,
    });

    // --- 5. Create the Web Router ---
    let app = build_router(app_state)?;

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cancel.clone()))
    .await?;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        error!("Rate-limit sweeper ended abnormally: {}", e);
    }
    info!("Server stopped.");
    Ok(())
}
