//! services/portal/src/bin/migrate.rs
//!
//! Applies the backend schema migrations. The portal itself only talks to
//! the backend over HTTP; this binary is the one place that needs a direct
//! Postgres connection, so it reads `DATABASE_URL` on its own.

use portal_lib::{config::ConfigError, error::AppError};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations complete.");

    Ok(())
}
