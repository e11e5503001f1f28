//! services/portal/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Base URL of the hosted auth/table service, without a trailing slash.
    pub backend_url: String,
    pub backend_anon_key: String,
    pub backend_timeout: Duration,
    pub auth_cookie_name: String,
    pub cookie_secure: bool,
    pub log_level: Level,
    /// Rewrite legacy role spellings to the canonical value when seen.
    pub legacy_role_rewrite: bool,
    /// Zero disables the listing cache.
    pub listing_cache_ttl: Duration,
    pub cors_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Hosted backend ---
        let backend_url = std::env::var("BACKEND_URL")
            .map_err(|_| ConfigError::MissingVar("BACKEND_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();
        if !(backend_url.starts_with("http://") || backend_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "BACKEND_URL".to_string(),
                "must start with http:// or https://".to_string(),
            ));
        }

        let backend_anon_key = std::env::var("BACKEND_ANON_KEY")
            .map_err(|_| ConfigError::MissingVar("BACKEND_ANON_KEY".to_string()))?;

        let backend_timeout = Duration::from_secs(parse_var("BACKEND_TIMEOUT_SECS", 10)?);

        // --- Cookies and behaviour switches ---
        let auth_cookie_name = std::env::var("AUTH_COOKIE_NAME")
            .unwrap_or_else(|_| default_cookie_name(&backend_url));
        let cookie_secure = parse_var("COOKIE_SECURE", true)?;
        let legacy_role_rewrite = parse_var("LEGACY_ROLE_REWRITE", true)?;
        let listing_cache_ttl = Duration::from_secs(parse_var("LISTING_CACHE_TTL_SECS", 30)?);

        let cors_origin = std::env::var("CORS_ORIGIN").ok();

        Ok(Self {
            bind_address,
            backend_url,
            backend_anon_key,
            backend_timeout,
            auth_cookie_name,
            cookie_secure,
            log_level,
            legacy_role_rewrite,
            listing_cache_ttl,
            cors_origin,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// `sb-<first host label>-auth-token`, the name the hosted SDKs use.
pub fn default_cookie_name(backend_url: &str) -> String {
    let host = backend_url
        .split("://")
        .nth(1)
        .unwrap_or(backend_url)
        .split(|c: char| c == '/' || c == ':')
        .next()
        .unwrap_or_default();
    let project_ref = host.split('.').next().unwrap_or("local");
    format!("sb-{}-auth-token", project_ref)
}
