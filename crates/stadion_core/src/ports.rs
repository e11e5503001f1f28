//! crates/stadion_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the portal
//! talks to the hosted backend and to the cookie jar only through them.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Facility, Instructor, NewFacility, NewInstructor, Profile, Session, User};
use crate::roles::Role;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, Postgres).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The backend answered with a structured error body.
    #[error("{message}")]
    Backend {
        code: Option<String>,
        message: String,
    },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn backend(code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Backend {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    fn code(&self) -> Option<&str> {
        match self {
            Self::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    fn message_contains(&self, needle: &str) -> bool {
        match self {
            Self::Backend { message, .. } | Self::Unexpected(message) => message.contains(needle),
            _ => false,
        }
    }

    /// The insert was rejected by a row-level security policy.
    pub fn is_row_level_security(&self) -> bool {
        self.code() == Some("42501") || self.message_contains("violates row-level security policy")
    }

    pub fn is_not_null_violation(&self) -> bool {
        self.code() == Some("23502") || self.message_contains("violates not-null constraint")
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some("23505")
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Session Store
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSitePolicy {
    Lax,
    Strict,
    None,
}

/// Cookie attributes dictated by the auth client and relayed untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Lifetime in seconds. `Some(0)` expires the cookie immediately.
    pub max_age: Option<i64>,
    pub same_site: Option<SameSitePolicy>,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: Some("/".to_string()),
            domain: None,
            max_age: None,
            same_site: Some(SameSitePolicy::Lax),
            secure: true,
            http_only: true,
        }
    }
}

impl CookieOptions {
    /// The same attributes, but expiring the cookie right away.
    pub fn expired(&self) -> Self {
        Self {
            max_age: Some(0),
            ..self.clone()
        }
    }
}

/// A single cookie write requested by the auth client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieWrite {
    pub name: String,
    pub value: String,
    pub options: CookieOptions,
}

/// Read/write access to the cookies of the current request, whatever the
/// execution context.
///
/// Writes never fail loudly: a context that forbids them returns `false`
/// and the cookie stays stale until the next intercepted request.
pub trait SessionStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;

    /// All cookies visible to this request, as `(name, value)` pairs.
    fn get_all(&self) -> Vec<(String, String)>;

    fn try_set(&self, name: &str, value: &str, options: &CookieOptions) -> bool;

    fn try_remove(&self, name: &str, options: &CookieOptions) -> bool;

    /// Applies a batch of writes. Returns `true` only if every write landed.
    fn try_set_all(&self, writes: &[CookieWrite]) -> bool {
        writes
            .iter()
            .map(|w| self.try_set(&w.name, &w.value, &w.options))
            .fold(true, |all, ok| all && ok)
    }
}

//=========================================================================================
// Backend Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Returns the current session, refreshing it first when the access
    /// token is about to expire. `Ok(None)` means nobody is signed in.
    async fn get_session(&self) -> PortResult<Option<Session>>;

    /// Validates the current access token with the auth service.
    async fn get_user(&self) -> PortResult<Option<User>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<Session>;

    /// Creates an account. The session is `None` when email confirmation is pending.
    async fn sign_up(&self, email: &str, password: &str, role: Role) -> PortResult<Option<Session>>;

    async fn sign_out(&self) -> PortResult<()>;
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Profiles ---
    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>>;

    async fn update_profile_role(&self, user_id: Uuid, role: Role) -> PortResult<()>;

    async fn list_profiles(&self, ids: &[Uuid]) -> PortResult<Vec<Profile>>;

    // --- Facilities ---
    async fn list_facilities(&self) -> PortResult<Vec<Facility>>;

    async fn insert_facility(&self, facility: &NewFacility) -> PortResult<Facility>;

    // --- Instructors ---
    async fn find_instructor_id_by_user(&self, user_id: Uuid) -> PortResult<Option<Uuid>>;

    /// Stores the instructor and all of its dependent rows atomically.
    async fn insert_instructor(&self, instructor: &NewInstructor) -> PortResult<Uuid>;

    async fn list_instructors(&self) -> PortResult<Vec<Instructor>>;
}

/// A backend client bound to one request's session store.
pub trait BackendClient: AuthService + DatabaseService {}

impl<T: AuthService + DatabaseService> BackendClient for T {}

/// Builds clients bound to a given session store. Holds no per-request state.
pub trait ClientFactory: Send + Sync {
    fn bind(&self, store: Arc<dyn SessionStore>) -> Arc<dyn BackendClient>;
}
