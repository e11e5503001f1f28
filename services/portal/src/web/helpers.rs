//! services/portal/src/web/helpers.rs
//!
//! Small pieces shared by the page and action handlers.

use axum::response::{IntoResponse, Redirect, Response};
use stadion_core::ports::{AuthService, BackendClient, PortError};
use stadion_core::{Denial, User};
use tracing::warn;

use crate::web::cookies::ResponseCookieStore;

/// The signed-in user, validated with the auth service. Failures count as
/// signed out.
pub async fn current_user(client: &dyn BackendClient) -> Option<User> {
    match client.get_user().await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "could not validate the current user");
            None
        }
    }
}

/// `path?param=text`, with `text` form-encoded.
pub fn redirect_with(path: &str, param: &str, text: &str) -> Response {
    let query = reqwest::Url::parse_with_params("http://portal.local/", &[(param, text)])
        .ok()
        .and_then(|url| url.query().map(str::to_string))
        .unwrap_or_default();
    Redirect::to(&format!("{}?{}", path, query)).into_response()
}

/// Redirects a denied page visit, using the parameter the denial calls for.
pub fn deny_redirect(path: &str, denial: &Denial, mismatch_text: &str) -> Response {
    let text = match denial {
        Denial::RoleMismatch { .. } => mismatch_text,
        Denial::NormalizationFailed(_) => "Could not set up your permissions correctly.",
        Denial::ProfileMissing | Denial::ProfileUnavailable(_) => "Could not verify your permissions.",
    };
    redirect_with(path, denial.redirect_param(), text)
}

/// User-facing message for a rejected insert.
pub fn describe_insert_error(e: &PortError, what: &str) -> String {
    if e.is_row_level_security() {
        format!("Permission denied: the database refused to store this {}.", what)
    } else if e.is_not_null_violation() {
        "Error: required fields are missing.".to_string()
    } else if e.is_unique_violation() {
        format!("This {} already exists.", what)
    } else {
        format!("Database error while creating the {}: {}", what, e)
    }
}

/// Attaches the action's cookie writes to its response.
pub fn with_cookies(store: &ResponseCookieStore, mut response: Response) -> Response {
    store.apply_to(&mut response);
    response
}
