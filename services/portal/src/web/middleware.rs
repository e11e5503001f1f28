//! services/portal/src/web/middleware.rs
//!
//! The edge interceptor that keeps the auth session fresh.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use stadion_core::ports::AuthService;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::web::cookies::{RefreshedCookies, SessionCookies};
use crate::web::state::AppState;

/// Middleware that refreshes an expiring session before any handler runs.
///
/// Rotated cookies are handed to handlers through request extensions and
/// written to the response as `Set-Cookie`. It never redirects: on any
/// failure the request passes through unchanged.
pub async fn refresh_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let store = SessionCookies::from_headers(req.headers(), None).writable();
    let client = state.factory.bind(store.clone());

    match client.get_session().await {
        Ok(Some(session)) => debug!(user_id = %session.user.id, "session checked"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "session refresh failed, passing request through"),
    }

    let refreshed = store.pending();
    if !refreshed.is_empty() {
        req.extensions_mut().insert(RefreshedCookies(refreshed));
    }

    let mut response = next.run(req).await;
    store.apply_to(&mut response);
    response
}
