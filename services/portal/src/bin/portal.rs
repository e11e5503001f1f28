//! services/portal/src/bin/portal.rs

use portal_lib::{
    adapters::HostedBackendFactory, build_router, config::Config, error::AppError,
    web::state::AppState,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Backend Adapter ---
    info!(backend = %config.backend_url, cookie = %config.auth_cookie_name, "Using hosted backend");
    let factory = Arc::new(HostedBackendFactory::new(&config)?);

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(factory, config.clone()));

    // --- 4. Create the Web Router ---
    let app = build_router(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
