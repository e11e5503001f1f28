//! services/portal/src/error.rs
//!
//! Defines the primary error type for the portal service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stadion_core::ports::PortError;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `portal` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a transport failure talking to the hosted backend.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Template Error: {0}")]
    Template(#[from] askama::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handler failures are logged in full; the client only sees a generic body.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        let (status, message) = match self {
            AppError::Port(_) | AppError::Http(_) => (
                StatusCode::BAD_GATEWAY,
                "The backend could not be reached. Please try again later.",
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong. Please try again later.",
            ),
        };
        (status, message).into_response()
    }
}
