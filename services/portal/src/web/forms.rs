//! services/portal/src/web/forms.rs
//!
//! Decodes the flat `application/x-www-form-urlencoded` bodies of the two
//! create forms into validation inputs.
//!
//! Repeated groups are submitted as `services[i].field` and
//! `availability[i].field`, with the row count in `services_count` and
//! `availability_count`.

use serde::Deserialize;
use stadion_core::validation::{AvailabilityInput, FacilityInput, InstructorInput, ServiceInput};
use std::collections::HashMap;

pub type FlatForm = HashMap<String, String>;

/// Upper bound on blank rows a new form may ask for.
pub const MAX_BLANK_ROWS: usize = 20;

fn text(form: &FlatForm, key: &str) -> String {
    form.get(key).cloned().unwrap_or_default()
}

fn optional(form: &FlatForm, key: &str) -> Option<String> {
    form.get(key).cloned()
}

/// Row count for a repeated group. Missing or garbage counts as zero.
pub fn group_count(form: &FlatForm, key: &str) -> usize {
    form.get(key)
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(0)
}

/// Indices of the `group[i].*` rows actually present in the form, below the
/// submitted count, in ascending order. Bounded by the body, not by the count.
fn row_indices(form: &FlatForm, group: &str, count: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = form
        .keys()
        .filter_map(|key| key.strip_prefix(group)?.strip_prefix('[')?.split_once("]."))
        .filter_map(|(index, _)| index.parse::<usize>().ok())
        .filter(|i| *i < count)
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

pub fn facility_input(form: &FlatForm) -> FacilityInput {
    FacilityInput {
        name: text(form, "name"),
        address: text(form, "address"),
        facility_type: text(form, "type"),
        capacity: text(form, "capacity"),
        description: optional(form, "description"),
        contact_phone: optional(form, "contact_phone"),
        contact_email: optional(form, "contact_email"),
        operating_hours_info: optional(form, "operating_hours_info"),
    }
}

pub fn instructor_input(form: &FlatForm) -> InstructorInput {
    let services = row_indices(form, "services", group_count(form, "services_count"))
        .into_iter()
        .map(|i| ServiceInput {
            service_name: text(form, &format!("services[{i}].service_name")),
            duration_minutes: text(form, &format!("services[{i}].duration_minutes")),
            price: text(form, &format!("services[{i}].price")),
        })
        .filter(|s| !s.service_name.trim().is_empty())
        .collect();

    let availability_rules = row_indices(form, "availability", group_count(form, "availability_count"))
        .into_iter()
        .map(|i| AvailabilityInput {
            day_of_week: text(form, &format!("availability[{i}].day_of_week")),
            start_time: text(form, &format!("availability[{i}].start_time")),
            end_time: text(form, &format!("availability[{i}].end_time")),
        })
        .filter(|a| !a.day_of_week.trim().is_empty())
        .collect();

    InstructorInput {
        specialty: text(form, "specialty"),
        bio: optional(form, "bio"),
        profile_pic_url: optional(form, "profile_pic_url"),
        is_available: form.get("is_available").map(String::as_str) == Some("true"),
        services,
        availability_rules,
    }
}

/// `?services=N&availability=M` on the new instructor form.
#[derive(Debug, Default, Deserialize)]
pub struct RowCounts {
    pub services: Option<usize>,
    pub availability: Option<usize>,
}

impl RowCounts {
    fn clamp(value: Option<usize>) -> usize {
        value.unwrap_or(1).clamp(1, MAX_BLANK_ROWS)
    }

    pub fn services(&self) -> usize {
        Self::clamp(self.services)
    }

    pub fn availability(&self) -> usize {
        Self::clamp(self.availability)
    }
}
