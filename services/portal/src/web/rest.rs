//! services/portal/src/web/rest.rs
//!
//! Contains the Axum handlers for the JSON listing endpoints and the master
//! definition for the OpenAPI specification.

use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::AppError;
use crate::web::cache::InstructorListing;
use crate::web::cookies::SessionCookies;
use crate::web::facilities::load_facilities;
use crate::web::instructors::load_instructors;
use crate::web::state::AppState;
use stadion_core::domain::Facility;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_facilities_handler,
        list_instructors_handler,
    ),
    components(
        schemas(FacilitySummary, InstructorSummary)
    ),
    tags(
        (name = "Stadion API", description = "Read-only listings of sports facilities and instructors.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// A facility as exposed by the public listing.
#[derive(Serialize, ToSchema)]
pub struct FacilitySummary {
    id: Uuid,
    name: String,
    address: String,
    #[serde(rename = "type")]
    facility_type: String,
    capacity: Option<i32>,
    description: Option<String>,
    contact_phone: Option<String>,
    contact_email: Option<String>,
    operating_hours_info: Option<String>,
    /// `Available`, `Occupied` or `Maintenance`.
    status: Option<String>,
    manager_name: Option<String>,
}

impl From<Facility> for FacilitySummary {
    fn from(f: Facility) -> Self {
        Self {
            id: f.id,
            name: f.name,
            address: f.address,
            facility_type: f.facility_type,
            capacity: f.capacity,
            description: f.description,
            contact_phone: f.contact_phone,
            contact_email: f.contact_email,
            operating_hours_info: f.operating_hours_info,
            status: f.status.map(|s| s.to_string()),
            manager_name: f.manager_name,
        }
    }
}

/// An instructor as exposed by the public listing.
#[derive(Serialize, ToSchema)]
pub struct InstructorSummary {
    id: Uuid,
    user_id: Uuid,
    display_name: Option<String>,
    specialty: Option<String>,
    bio: Option<String>,
    profile_pic_url: Option<String>,
    is_available: bool,
    created_at: Option<DateTime<Utc>>,
}

impl From<InstructorListing> for InstructorSummary {
    fn from(listing: InstructorListing) -> Self {
        let i = listing.instructor;
        Self {
            id: i.id,
            user_id: i.user_id,
            display_name: listing.display_name,
            specialty: i.specialty,
            bio: i.bio,
            profile_pic_url: i.profile_pic_url,
            is_available: i.is_available,
            created_at: i.created_at,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List all facilities, ordered by name.
#[utoipa::path(
    get,
    path = "/api/facilities",
    responses(
        (status = 200, description = "Facilities listing", body = Vec<FacilitySummary>),
        (status = 502, description = "The backend could not be reached")
    )
)]
pub async fn list_facilities_handler(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
) -> Result<Json<Vec<FacilitySummary>>, AppError> {
    let client = state.factory.bind(cookies.read_only());
    let facilities = load_facilities(&state, client.as_ref()).await?;
    Ok(Json(facilities.into_iter().map(FacilitySummary::from).collect()))
}

/// List all instructors, newest first.
#[utoipa::path(
    get,
    path = "/api/instructors",
    responses(
        (status = 200, description = "Instructors listing", body = Vec<InstructorSummary>),
        (status = 502, description = "The backend could not be reached")
    )
)]
pub async fn list_instructors_handler(
    State(state): State<Arc<AppState>>,
    cookies: SessionCookies,
) -> Result<Json<Vec<InstructorSummary>>, AppError> {
    let client = state.factory.bind(cookies.read_only());
    let instructors = load_instructors(&state, client.as_ref()).await?;
    Ok(Json(instructors.into_iter().map(InstructorSummary::from).collect()))
}
