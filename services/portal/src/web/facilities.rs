//! services/portal/src/web/facilities.rs
//!
//! Facility listing, the new-facility form and the create action.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    Form,
};
use stadion_core::domain::Facility;
use stadion_core::ports::{BackendClient, DatabaseService, PortResult};
use stadion_core::validation::{validate_facility, FacilityInput, FieldErrors};
use stadion_core::{Denial, Role, RoleMatch, User};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::web::cache::Lookup;
use crate::web::cookies::SessionCookies;
use crate::web::forms::{facility_input, FlatForm};
use crate::web::helpers::{current_user, deny_redirect, describe_insert_error, redirect_with, with_cookies};
use crate::web::state::AppState;
use crate::web::templates::{
    render_template, render_with_status, Banners, FacilitiesTemplate, FacilityCard,
    FacilityFormTemplate, FacilityValues, Header,
};

const MANAGERS_ONLY: &str = "Access denied. Only facility managers can create facilities.";

/// The facility listing, from the cache when it is fresh.
pub(crate) async fn load_facilities(
    state: &AppState,
    client: &dyn BackendClient,
) -> PortResult<Vec<Facility>> {
    let generation = match state.cache.facilities().await {
        Lookup::Hit(cached) => return Ok(cached),
        Lookup::Miss(generation) => generation,
    };
    let facilities = client.list_facilities().await?;
    state.cache.store_facilities(generation, facilities.clone()).await;
    Ok(facilities)
}

/// Whether `user` may see the create link. Only the exact manager role counts.
async fn is_manager(state: &AppState, client: &dyn BackendClient, user: &User) -> bool {
    match client.fetch_profile(user.id).await {
        Ok(Some(profile)) => {
            state
                .gate
                .table()
                .classify(profile.user_role.as_deref(), Role::FacilityManager)
                == RoleMatch::Canonical
        }
        Ok(None) => false,
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "could not read profile for the listing");
            false
        }
    }
}

/// GET /facilities
pub async fn list_facilities_page(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
    Query(mut banners): Query<Banners>,
) -> Response {
    let client = state.factory.bind(cookies.read_only());
    let user = current_user(client.as_ref()).await;

    let can_create = match &user {
        Some(user) => is_manager(&state, client.as_ref(), user).await,
        None => false,
    };

    let facilities = match load_facilities(&state, client.as_ref()).await {
        Ok(facilities) => facilities,
        Err(e) => {
            error!(error = %e, table = "facilities", "failed to load facilities");
            banners.error.get_or_insert_with(|| "Could not load facilities.".to_string());
            Vec::new()
        }
    };

    render_template(FacilitiesTemplate {
        header: Header::for_user(user.as_ref()),
        facilities: facilities.iter().map(FacilityCard::from).collect(),
        can_create,
        banners,
    })
}

/// GET /facilities/new
pub async fn new_facility_page(State(state): State<Arc<AppState>>, cookies: SessionCookies) -> Response {
    let client = state.factory.bind(cookies.read_only());
    let Some(user) = current_user(client.as_ref()).await else {
        return redirect_with("/login", "message", "You need to be signed in to add a facility.");
    };

    if let Err(denial) = state
        .gate
        .require_role(client.as_ref(), user.id, Role::FacilityManager)
        .await
    {
        return deny_redirect("/facilities", &denial, "Only facility managers can add facilities.");
    }

    render_template(FacilityFormTemplate {
        header: Header::for_user(Some(&user)),
        values: FacilityValues::default(),
        errors: FieldErrors::default(),
        form_error: None,
    })
}

fn form_again(user: Option<&User>, input: &FacilityInput, errors: FieldErrors, message: String) -> Response {
    render_with_status(
        StatusCode::UNPROCESSABLE_ENTITY,
        FacilityFormTemplate {
            header: Header::for_user(user),
            values: FacilityValues::from(input),
            errors,
            form_error: Some(message),
        },
    )
}

/// POST /facilities - Create a facility managed by the caller
pub async fn create_facility(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
    Form(form): Form<FlatForm>,
) -> Response {
    let store = cookies.writable();
    let client = state.factory.bind(store.clone());
    let input = facility_input(&form);

    // 1. Authentication
    let Some(user) = current_user(client.as_ref()).await else {
        let message = "Authentication error. Please sign in again.".to_string();
        return with_cookies(&store, form_again(None, &input, FieldErrors::default(), message));
    };

    // 2. Authorization
    if let Err(denial) = state
        .gate
        .require_role(client.as_ref(), user.id, Role::FacilityManager)
        .await
    {
        let message = match denial {
            Denial::RoleMismatch { .. } => MANAGERS_ONLY,
            _ => "Could not verify your permissions.",
        };
        return with_cookies(
            &store,
            form_again(Some(&user), &input, FieldErrors::default(), message.to_string()),
        );
    }

    // 3. Validation
    let facility = match validate_facility(&input, user.id) {
        Ok(facility) => facility,
        Err(errors) => {
            info!(user_id = %user.id, fields = errors.iter().count(), "facility form rejected");
            let message = "Validation failed. Check the highlighted fields.".to_string();
            return with_cookies(&store, form_again(Some(&user), &input, errors, message));
        }
    };

    // 4. Insert
    match client.insert_facility(&facility).await {
        Ok(created) => {
            info!(facility_id = %created.id, user_id = %user.id, "facility created, invalidating listing");
            state.cache.invalidate_facilities().await;
            with_cookies(
                &store,
                redirect_with("/facilities", "message", "Facility created successfully!"),
            )
        }
        Err(e) => {
            error!(user_id = %user.id, error = %e, table = "facilities", "facility insert failed");
            let message = describe_insert_error(&e, "facility");
            with_cookies(&store, form_again(Some(&user), &input, FieldErrors::default(), message))
        }
    }
}
