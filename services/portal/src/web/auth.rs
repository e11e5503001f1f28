//! services/portal/src/web/auth.rs
//!
//! Sign-in, sign-up and sign-out pages and their form actions.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use stadion_core::ports::AuthService;
use stadion_core::Role;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::web::cookies::SessionCookies;
use crate::web::helpers::{current_user, redirect_with, with_cookies};
use crate::web::state::AppState;
use crate::web::templates::{
    render_template, render_with_status, role_options, Banners, Header, LoginTemplate,
    SignupTemplate,
};

pub const MIN_PASSWORD_CHARS: usize = 6;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub role: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /login
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
    Query(banners): Query<Banners>,
) -> Response {
    let client = state.factory.bind(cookies.read_only());
    let user = current_user(client.as_ref()).await;
    render_template(LoginTemplate {
        header: Header::for_user(user.as_ref()),
        email: String::new(),
        banners,
    })
}

/// POST /login - Exchange email and password for a session cookie
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
    Form(form): Form<LoginForm>,
) -> Response {
    let store = cookies.writable();
    let client = state.factory.bind(store.clone());
    let email = form.email.trim().to_string();

    match client.sign_in_with_password(&email, &form.password).await {
        Ok(session) => {
            info!(user_id = %session.user.id, "login succeeded");
            with_cookies(&store, Redirect::to("/").into_response())
        }
        Err(e) => {
            warn!(error = %e, "login failed");
            let page = LoginTemplate {
                header: Header::default(),
                email,
                banners: Banners {
                    message: None,
                    error: Some("Could not sign in. Check your email and password.".to_string()),
                },
            };
            with_cookies(&store, render_with_status(StatusCode::UNAUTHORIZED, page))
        }
    }
}

/// GET /signup
pub async fn signup_page(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
    Query(banners): Query<Banners>,
) -> Response {
    let client = state.factory.bind(cookies.read_only());
    let user = current_user(client.as_ref()).await;
    render_template(SignupTemplate {
        header: Header::for_user(user.as_ref()),
        email: String::new(),
        roles: role_options(Some(Role::User)),
        banners,
    })
}

fn check_signup(form: &SignupForm) -> Result<Role, &'static str> {
    let role = Role::from_canonical(form.role.trim()).ok_or("Pick a valid account type.")?;
    if form.password != form.confirm_password {
        return Err("Passwords do not match.");
    }
    if form.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err("Password must be at least 6 characters.");
    }
    Ok(role)
}

/// POST /signup - Create an account with the chosen role
pub async fn signup_submit(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
    Form(form): Form<SignupForm>,
) -> Response {
    let email = form.email.trim().to_string();
    let rerender = |error: String, role: Option<Role>| {
        render_with_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            SignupTemplate {
                header: Header::default(),
                email: email.clone(),
                roles: role_options(role),
                banners: Banners {
                    message: None,
                    error: Some(error),
                },
            },
        )
    };

    let role = match check_signup(&form) {
        Ok(role) => role,
        Err(reason) => return rerender(reason.to_string(), Role::from_canonical(form.role.trim())),
    };

    let store = cookies.writable();
    let client = state.factory.bind(store.clone());
    match client.sign_up(&email, &form.password, role).await {
        Ok(Some(_)) => with_cookies(&store, Redirect::to("/").into_response()),
        Ok(None) => redirect_with(
            "/login",
            "message",
            "Check your email to confirm your account, then sign in.",
        ),
        Err(e) if e.to_string().to_lowercase().contains("already registered") => {
            warn!(role = %role, "sign-up for an existing email");
            rerender("This email is already registered. Sign in instead.".to_string(), Some(role))
        }
        Err(e) => {
            error!(error = %e, "sign-up failed");
            rerender("Could not create your account. Please try again.".to_string(), Some(role))
        }
    }
}

/// POST /logout - Clear the session locally and revoke it remotely
pub async fn logout(State(state): State<Arc<AppState>>, cookies: SessionCookies) -> Response {
    let store = cookies.writable();
    let client = state.factory.bind(store.clone());
    let response = match client.sign_out().await {
        Ok(()) => redirect_with("/login", "message", "You have been signed out."),
        Err(e) => {
            error!(error = %e, "sign-out failed");
            redirect_with("/login", "error", "Something went wrong while signing out.")
        }
    };
    with_cookies(&store, response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(password: &str, confirm: &str, role: &str) -> SignupForm {
        SignupForm {
            email: "ana@example.com".into(),
            password: password.into(),
            confirm_password: confirm.into(),
            role: role.into(),
        }
    }

    #[test]
    fn signup_checks_role_and_passwords() {
        assert_eq!(check_signup(&form("secret1", "secret1", "INSTRUCTOR")), Ok(Role::Instructor));
        assert_eq!(check_signup(&form("secret1", "secret2", "USER")), Err("Passwords do not match."));
        assert!(check_signup(&form("abc", "abc", "USER")).is_err());
        assert!(check_signup(&form("secret1", "secret1", "ADMIN")).is_err());
        assert!(check_signup(&form("secret1", "secret1", "instructor")).is_err());
    }
}
