//! services/portal/src/web/instructors.rs
//!
//! Instructor listing, the new-profile form and the create action.
//!
//! Creating a profile runs as a small state machine: authenticate, authorize,
//! refuse a second profile, validate, then insert the instructor and its
//! dependent rows in one call. A row-level-security rejection gets exactly one
//! normalize-and-retry cycle.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    Form,
};
use stadion_core::ports::{BackendClient, DatabaseService, PortResult};
use stadion_core::validation::{validate_instructor, FieldErrors, InstructorInput};
use stadion_core::{Denial, Role, RoleMatch, User};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::web::cache::{InstructorListing, Lookup};
use crate::web::cookies::SessionCookies;
use crate::web::forms::{instructor_input, FlatForm, RowCounts};
use crate::web::helpers::{current_user, deny_redirect, describe_insert_error, redirect_with, with_cookies};
use crate::web::state::AppState;
use crate::web::templates::{
    render_template, render_with_status, Banners, Header, InstructorCard, InstructorFormTemplate,
    InstructorsTemplate,
};

const ALREADY_INSTRUCTOR: &str = "You already have an instructor profile.";

/// The instructor listing, newest first, with display names from `profiles`.
///
/// A failed name lookup is logged and the listing is returned without names
/// (and not cached).
pub(crate) async fn load_instructors(
    state: &AppState,
    client: &dyn BackendClient,
) -> PortResult<Vec<InstructorListing>> {
    let generation = match state.cache.instructors().await {
        Lookup::Hit(cached) => return Ok(cached),
        Lookup::Miss(generation) => generation,
    };

    let instructors = client.list_instructors().await?;
    let mut user_ids: Vec<Uuid> = instructors.iter().map(|i| i.user_id).collect();
    user_ids.sort_unstable();
    user_ids.dedup();

    let (names, complete): (HashMap<Uuid, String>, bool) = match client.list_profiles(&user_ids).await {
        Ok(profiles) => (
            profiles
                .into_iter()
                .filter_map(|p| Some((p.id, p.display_name?)))
                .collect(),
            true,
        ),
        Err(e) => {
            warn!(error = %e, table = "profiles", "could not load instructor names");
            (HashMap::new(), false)
        }
    };

    let listing: Vec<InstructorListing> = instructors
        .into_iter()
        .map(|instructor| InstructorListing {
            display_name: names.get(&instructor.user_id).cloned(),
            instructor,
        })
        .collect();
    if complete {
        state.cache.store_instructors(generation, listing.clone()).await;
    }
    Ok(listing)
}

/// GET /instructors
pub async fn list_instructors_page(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
    Query(mut banners): Query<Banners>,
) -> Response {
    let client = state.factory.bind(cookies.read_only());
    let user = current_user(client.as_ref()).await;

    let can_create = match &user {
        Some(user) => match client.fetch_profile(user.id).await {
            Ok(Some(profile)) => {
                state
                    .gate
                    .table()
                    .classify(profile.user_role.as_deref(), Role::Instructor)
                    != RoleMatch::NoMatch
            }
            Ok(None) => false,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "could not read profile for the listing");
                false
            }
        },
        None => false,
    };

    let instructors = match load_instructors(&state, client.as_ref()).await {
        Ok(instructors) => instructors,
        Err(e) => {
            error!(error = %e, table = "instructors", "failed to load instructors");
            banners.error.get_or_insert_with(|| "Could not load instructors.".to_string());
            Vec::new()
        }
    };

    render_template(InstructorsTemplate {
        header: Header::for_user(user.as_ref()),
        instructors: instructors.iter().map(InstructorCard::from).collect(),
        can_create,
        banners,
    })
}

/// GET /instructors/new
pub async fn new_instructor_page(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
    Query(rows): Query<RowCounts>,
) -> Response {
    let client = state.factory.bind(cookies.read_only());
    let Some(user) = current_user(client.as_ref()).await else {
        return redirect_with(
            "/login",
            "message",
            "You need to be signed in to create an instructor profile.",
        );
    };

    match client.find_instructor_id_by_user(user.id).await {
        Ok(Some(instructor_id)) => {
            info!(user_id = %user.id, %instructor_id, "instructor profile already exists");
            return redirect_with("/instructors", "message", ALREADY_INSTRUCTOR);
        }
        Ok(None) => {}
        Err(e) => warn!(user_id = %user.id, error = %e, "could not check for an existing instructor"),
    }

    if let Err(denial) = state
        .gate
        .require_role(client.as_ref(), user.id, Role::Instructor)
        .await
    {
        return deny_redirect(
            "/instructors",
            &denial,
            "You do not have permission to create an instructor profile.",
        );
    }

    render_template(InstructorFormTemplate::blank(
        Header::for_user(Some(&user)),
        rows.services(),
        rows.availability(),
    ))
}

fn form_again(user: Option<&User>, input: &InstructorInput, errors: FieldErrors, message: String) -> Response {
    render_with_status(
        StatusCode::UNPROCESSABLE_ENTITY,
        InstructorFormTemplate::echo(Header::for_user(user), input, errors, Some(message)),
    )
}

/// POST /instructors - Create the caller's instructor profile
pub async fn create_instructor(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
    Form(form): Form<FlatForm>,
) -> Response {
    let store = cookies.writable();
    let client = state.factory.bind(store.clone());
    let input = instructor_input(&form);
    let fail = |user: Option<&User>, errors: FieldErrors, message: String| {
        with_cookies(&store, form_again(user, &input, errors, message))
    };

    // 1. Authentication
    let Some(user) = current_user(client.as_ref()).await else {
        return fail(None, FieldErrors::default(), "Authentication error. Please sign in again.".to_string());
    };

    // 2. Authorization
    if let Err(denial) = state
        .gate
        .require_role(client.as_ref(), user.id, Role::Instructor)
        .await
    {
        let message = match denial {
            Denial::RoleMismatch { .. } => "Access denied. Only instructors can create an instructor profile.",
            _ => "Could not set up instructor permissions for your account.",
        };
        return fail(Some(&user), FieldErrors::default(), message.to_string());
    }

    // 3. One profile per user
    match client.find_instructor_id_by_user(user.id).await {
        Ok(Some(_)) => {
            warn!(user_id = %user.id, "attempt to create a second instructor profile");
            return fail(Some(&user), FieldErrors::default(), ALREADY_INSTRUCTOR.to_string());
        }
        Ok(None) => {}
        Err(e) => {
            error!(user_id = %user.id, error = %e, "existing instructor check failed");
            return fail(
                Some(&user),
                FieldErrors::default(),
                "Could not check for an existing profile.".to_string(),
            );
        }
    }

    // 4. Validation
    let instructor = match validate_instructor(&input, user.id) {
        Ok(instructor) => instructor,
        Err(errors) => {
            info!(user_id = %user.id, fields = errors.iter().count(), "instructor form rejected");
            return fail(
                Some(&user),
                errors,
                "Validation failed. Check the highlighted fields.".to_string(),
            );
        }
    };

    // 5. Atomic insert, with one normalize-and-retry on a policy rejection
    let inserted = match client.insert_instructor(&instructor).await {
        Err(e) if e.is_row_level_security() => {
            warn!(user_id = %user.id, error = %e, "instructor insert rejected by policy, normalizing role");
            if let Err(denial) = state.gate.renormalize(client.as_ref(), user.id, Role::Instructor).await {
                error!(user_id = %user.id, %denial, "role normalization before retry failed");
                return fail(
                    Some(&user),
                    FieldErrors::default(),
                    "Security error: no permission to create an instructor profile. \
                     Make sure your profile has the instructor role."
                        .to_string(),
                );
            }
            match client.insert_instructor(&instructor).await {
                Err(e) if e.is_row_level_security() => {
                    error!(user_id = %user.id, error = %e, "instructor insert rejected again after normalization");
                    let code: String = user.id.to_string().chars().take(8).collect();
                    return fail(
                        Some(&user),
                        FieldErrors::default(),
                        format!(
                            "Persistent security error: the instructor profile could not be created \
                             even after updating your role. Contact the administrator with the code: \
                             RLS-AUTH-FAIL-{}",
                            code
                        ),
                    );
                }
                Err(e) => {
                    error!(user_id = %user.id, error = %e, "instructor insert failed after normalization");
                    return fail(
                        Some(&user),
                        FieldErrors::default(),
                        format!("Error creating the instructor profile after updating your role: {}", e),
                    );
                }
                Ok(id) => id,
            }
        }
        Err(e) => {
            error!(user_id = %user.id, error = %e, table = "instructors", "instructor insert failed");
            return fail(Some(&user), FieldErrors::default(), describe_insert_error(&e, "profile"));
        }
        Ok(id) => id,
    };

    // 6. Invalidate and redirect
    info!(user_id = %user.id, instructor_id = %inserted, "instructor profile created, invalidating listing");
    state.cache.invalidate_instructors().await;
    with_cookies(
        &store,
        redirect_with("/instructors", "message", "Instructor profile created successfully!"),
    )
}
