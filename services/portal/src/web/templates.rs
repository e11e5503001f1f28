// Askama template definitions

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use stadion_core::domain::{Facility, SIGNUP_ROLES};
use stadion_core::validation::{FacilityInput, FieldErrors, InstructorInput};
use stadion_core::{Role, User};

use super::cache::InstructorListing;
use crate::error::AppError;

// Helper to render templates and handle errors
pub fn render_template<T: Template>(template: T) -> Response {
    render_with_status(StatusCode::OK, template)
}

pub fn render_with_status<T: Template>(status: StatusCode, template: T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

// Session-aware header shown on every page
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub email: Option<String>,
}

impl Header {
    pub fn for_user(user: Option<&User>) -> Self {
        Self {
            email: user.map(|u| u.email.clone().unwrap_or_else(|| u.id.to_string())),
        }
    }
}

// Banners carried in the query string after a redirect
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Banners {
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub header: Header,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub header: Header,
    pub email: String,
    pub banners: Banners,
}

pub struct RoleOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

pub fn role_options(selected: Option<Role>) -> Vec<RoleOption> {
    SIGNUP_ROLES
        .iter()
        .map(|role| RoleOption {
            value: role.as_str(),
            label: role.label(),
            selected: Some(*role) == selected,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub header: Header,
    pub email: String,
    pub roles: Vec<RoleOption>,
    pub banners: Banners,
}

//=========================================================================================
// Facilities
//=========================================================================================

// Facility with display strings precomputed for the template
pub struct FacilityCard {
    pub name: String,
    pub address: String,
    pub facility_type: String,
    pub capacity: String,
    pub status: String,
    pub manager: String,
    pub description: String,
    pub contact: String,
    pub hours: String,
}

impl From<&Facility> for FacilityCard {
    fn from(f: &Facility) -> Self {
        let contact = [f.contact_phone.as_deref(), f.contact_email.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" · ");
        Self {
            name: f.name.clone(),
            address: f.address.clone(),
            facility_type: f.facility_type.clone(),
            capacity: f
                .capacity
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            status: f
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            manager: f
                .manager_name
                .clone()
                .unwrap_or_else(|| "Unknown manager".to_string()),
            description: f.description.clone().unwrap_or_default(),
            contact,
            hours: f.operating_hours_info.clone().unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "facilities.html")]
pub struct FacilitiesTemplate {
    pub header: Header,
    pub facilities: Vec<FacilityCard>,
    pub can_create: bool,
    pub banners: Banners,
}

// Submitted facility values echoed back into the form
#[derive(Default)]
pub struct FacilityValues {
    pub name: String,
    pub address: String,
    pub facility_type: String,
    pub capacity: String,
    pub description: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub operating_hours_info: String,
}

impl From<&FacilityInput> for FacilityValues {
    fn from(input: &FacilityInput) -> Self {
        Self {
            name: input.name.clone(),
            address: input.address.clone(),
            facility_type: input.facility_type.clone(),
            capacity: input.capacity.clone(),
            description: input.description.clone().unwrap_or_default(),
            contact_phone: input.contact_phone.clone().unwrap_or_default(),
            contact_email: input.contact_email.clone().unwrap_or_default(),
            operating_hours_info: input.operating_hours_info.clone().unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "facility_form.html")]
pub struct FacilityFormTemplate {
    pub header: Header,
    pub values: FacilityValues,
    pub errors: FieldErrors,
    pub form_error: Option<String>,
}

//=========================================================================================
// Instructors
//=========================================================================================

pub struct InstructorCard {
    pub name: String,
    pub specialty: String,
    pub bio: String,
    pub available: bool,
    pub picture: String,
    pub contact: String,
    pub since: String,
}

impl From<&InstructorListing> for InstructorCard {
    fn from(listing: &InstructorListing) -> Self {
        let i = &listing.instructor;
        let contact = [i.contact_phone.as_deref(), i.contact_email.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" · ");
        Self {
            name: listing
                .display_name
                .clone()
                .unwrap_or_else(|| "Instructor".to_string()),
            specialty: i.specialty.clone().unwrap_or_default(),
            bio: i.bio.clone().unwrap_or_default(),
            available: i.is_available,
            picture: i.profile_pic_url.clone().unwrap_or_default(),
            contact,
            since: i
                .created_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "instructors.html")]
pub struct InstructorsTemplate {
    pub header: Header,
    pub instructors: Vec<InstructorCard>,
    pub can_create: bool,
    pub banners: Banners,
}

#[derive(Default)]
pub struct ServiceRow {
    pub index: usize,
    pub service_name: String,
    pub duration_minutes: String,
    pub price: String,
}

#[derive(Default)]
pub struct AvailabilityRow {
    pub index: usize,
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
}

pub struct DayOption {
    pub value: String,
    pub label: &'static str,
}

const DAY_LABELS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Template)]
#[template(path = "instructor_form.html")]
pub struct InstructorFormTemplate {
    pub header: Header,
    pub specialty: String,
    pub bio: String,
    pub profile_pic_url: String,
    pub is_available: bool,
    pub services: Vec<ServiceRow>,
    pub availability: Vec<AvailabilityRow>,
    pub days: Vec<DayOption>,
    pub errors: FieldErrors,
    pub form_error: Option<String>,
}

impl InstructorFormTemplate {
    /// A fresh form with the requested number of blank rows.
    pub fn blank(header: Header, services: usize, availability: usize) -> Self {
        Self {
            header,
            specialty: String::new(),
            bio: String::new(),
            profile_pic_url: String::new(),
            is_available: true,
            services: (0..services)
                .map(|index| ServiceRow {
                    index,
                    duration_minutes: "60".to_string(),
                    ..ServiceRow::default()
                })
                .collect(),
            availability: (0..availability)
                .map(|index| AvailabilityRow {
                    index,
                    ..AvailabilityRow::default()
                })
                .collect(),
            days: day_options(),
            errors: FieldErrors::default(),
            form_error: None,
        }
    }

    /// The form re-filled with what was submitted.
    pub fn echo(header: Header, input: &InstructorInput, errors: FieldErrors, form_error: Option<String>) -> Self {
        let mut services: Vec<ServiceRow> = input
            .services
            .iter()
            .enumerate()
            .map(|(index, s)| ServiceRow {
                index,
                service_name: s.service_name.clone(),
                duration_minutes: s.duration_minutes.clone(),
                price: s.price.clone(),
            })
            .collect();
        if services.is_empty() {
            services.push(ServiceRow::default());
        }
        let mut availability: Vec<AvailabilityRow> = input
            .availability_rules
            .iter()
            .enumerate()
            .map(|(index, a)| AvailabilityRow {
                index,
                day_of_week: a.day_of_week.clone(),
                start_time: a.start_time.clone(),
                end_time: a.end_time.clone(),
            })
            .collect();
        if availability.is_empty() {
            availability.push(AvailabilityRow::default());
        }
        Self {
            header,
            specialty: input.specialty.clone(),
            bio: input.bio.clone().unwrap_or_default(),
            profile_pic_url: input.profile_pic_url.clone().unwrap_or_default(),
            is_available: input.is_available,
            services,
            availability,
            days: day_options(),
            errors,
            form_error,
        }
    }
}

fn day_options() -> Vec<DayOption> {
    DAY_LABELS
        .iter()
        .enumerate()
        .map(|(value, label)| DayOption {
            value: value.to_string(),
            label: *label,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stadion_core::validation::ServiceInput;

    #[test]
    fn echo_keeps_submitted_rows() {
        let input = InstructorInput {
            specialty: "Te".into(),
            services: vec![ServiceInput {
                service_name: "Private lesson".into(),
                duration_minutes: "10".into(),
                price: "80".into(),
            }],
            ..InstructorInput::default()
        };
        let mut errors = FieldErrors::default();
        errors.add("services", "Service 1: minimum duration is 15 minutes.");
        let page = InstructorFormTemplate::echo(Header::default(), &input, errors, None);
        assert_eq!(page.services.len(), 1);
        assert_eq!(page.services[0].duration_minutes, "10");
        assert_eq!(page.availability.len(), 1);

        let html = page.render().unwrap();
        assert!(html.contains("Private lesson"));
        assert!(html.contains("minimum duration is 15 minutes"));
    }

    #[test]
    fn blank_form_has_requested_rows() {
        let page = InstructorFormTemplate::blank(Header::default(), 3, 2);
        let html = page.render().unwrap();
        assert!(html.contains("name=\"services[2].service_name\""));
        assert!(html.contains("name=\"availability[1].day_of_week\""));
        assert!(html.contains("name=\"services_count\" value=\"3\""));
    }

    #[test]
    fn role_picker_marks_selection() {
        let options = role_options(Some(Role::Instructor));
        assert_eq!(options.len(), 3);
        assert!(options.iter().any(|o| o.value == "INSTRUCTOR" && o.selected));
        assert!(options.iter().filter(|o| o.selected).count() == 1);
    }
}
