//! crates/stadion_core/src/validation.rs
//!
//! Field validation for the facility and instructor creation forms.
//!
//! Inputs arrive as the raw strings the browser submitted. Validation either
//! produces the typed insert payload or a `FieldErrors` list keyed by form
//! field name; nothing is inserted unless it succeeds.

use lazy_static::lazy_static;
use regex::Regex;
use std::num::IntErrorKind;
use uuid::Uuid;

use crate::domain::{NewAvailabilityRule, NewFacility, NewInstructor, NewService};

lazy_static! {
    /// Loose RFC 5322 shape: something@something.tld, no whitespace.
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();

    /// Absolute http(s) URL with a host.
    static ref URL_REGEX: Regex = Regex::new(
        r"^https?://[a-zA-Z0-9]([-a-zA-Z0-9.]*[a-zA-Z0-9])?(:\d+)?(/[^\s]*)?$"
    ).unwrap();

    /// 24h wall-clock time, HH:MM.
    static ref TIME_REGEX: Regex = Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap();
}

pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_PHONE_CHARS: usize = 20;
pub const MAX_HOURS_INFO_CHARS: usize = 200;
pub const MIN_SERVICE_MINUTES: i32 = 15;
/// Most rows one instructor profile may carry per repeated group.
pub const MAX_GROUP_ROWS: usize = 50;

//=========================================================================================
// Field Errors
//=========================================================================================

/// Per-field error messages, in the order fields were checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors {
    entries: Vec<(&'static str, Vec<String>)>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        let message = message.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.entries.push((field, vec![message])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, messages)| messages.as_slice())
            .unwrap_or(&[])
    }

    /// Messages for `field` joined for display, or an empty string.
    pub fn joined(&self, field: &str) -> String {
        self.get(field).join(", ")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[String])> {
        self.entries.iter().map(|(name, messages)| (*name, messages.as_slice()))
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

//=========================================================================================
// Raw Inputs
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacilityInput {
    pub name: String,
    pub address: String,
    pub facility_type: String,
    pub capacity: String,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub operating_hours_info: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceInput {
    pub service_name: String,
    pub duration_minutes: String,
    pub price: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailabilityInput {
    pub day_of_week: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstructorInput {
    pub specialty: String,
    pub bio: Option<String>,
    pub profile_pic_url: Option<String>,
    pub is_available: bool,
    pub services: Vec<ServiceInput>,
    pub availability_rules: Vec<AvailabilityInput>,
}

//=========================================================================================
// Validators
//=========================================================================================

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Treats empty and whitespace-only optional fields as absent.
fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn check_max(errors: &mut FieldErrors, field: &'static str, value: &Option<String>, max: usize, message: &str) {
    if let Some(v) = value {
        if char_len(v) > max {
            errors.add(field, message);
        }
    }
}

pub fn validate_facility(input: &FacilityInput, manager_id: Uuid) -> Result<NewFacility, FieldErrors> {
    let mut errors = FieldErrors::default();

    let name = input.name.trim();
    if char_len(name) < 3 {
        errors.add("name", "Name must be at least 3 characters.");
    }

    let address = input.address.trim();
    if char_len(address) < 5 {
        errors.add("address", "Address must be at least 5 characters.");
    }

    let facility_type = input.facility_type.trim();
    if facility_type.is_empty() {
        errors.add("type", "Type is required.");
    }

    let capacity = match parse_integer(&input.capacity) {
        Ok(c) if c >= 0 => Some(c),
        Ok(_) => {
            errors.add("capacity", "Capacity cannot be negative.");
            None
        }
        Err(message) => {
            errors.add("capacity", message.replace("{field}", "Capacity"));
            None
        }
    };

    let description = present(&input.description);
    check_max(
        &mut errors,
        "description",
        &description,
        MAX_DESCRIPTION_CHARS,
        "Description is too long (max 500 characters).",
    );

    let contact_phone = present(&input.contact_phone);
    check_max(&mut errors, "contact_phone", &contact_phone, MAX_PHONE_CHARS, "Phone number is too long.");

    let contact_email = present(&input.contact_email);
    if let Some(email) = &contact_email {
        if !EMAIL_REGEX.is_match(email) {
            errors.add("contact_email", "Invalid email format.");
        }
    }

    let operating_hours_info = present(&input.operating_hours_info);
    check_max(
        &mut errors,
        "operating_hours_info",
        &operating_hours_info,
        MAX_HOURS_INFO_CHARS,
        "Opening hours information is too long.",
    );

    errors.into_result(|| NewFacility {
        name: name.to_string(),
        address: address.to_string(),
        facility_type: facility_type.to_string(),
        capacity: capacity.unwrap_or_default(),
        description,
        contact_phone,
        contact_email,
        operating_hours_info,
        manager_id,
    })
}

pub fn validate_instructor(input: &InstructorInput, user_id: Uuid) -> Result<NewInstructor, FieldErrors> {
    let mut errors = FieldErrors::default();

    let specialty = input.specialty.trim();
    if char_len(specialty) < 3 {
        errors.add("specialty", "Specialty must be at least 3 characters.");
    }

    let bio = present(&input.bio);
    check_max(&mut errors, "bio", &bio, MAX_BIO_CHARS, "Biography is too long (max 500 characters).");

    let profile_pic_url = present(&input.profile_pic_url);
    if let Some(url) = &profile_pic_url {
        if !URL_REGEX.is_match(url) {
            errors.add("profile_pic_url", "Invalid profile picture URL.");
        }
    }

    if input.services.len() > MAX_GROUP_ROWS {
        errors.add("services", format!("Too many services (max {MAX_GROUP_ROWS})."));
    }
    if input.availability_rules.len() > MAX_GROUP_ROWS {
        errors.add(
            "availability_rules",
            format!("Too many availability rules (max {MAX_GROUP_ROWS})."),
        );
    }

    let mut services = Vec::with_capacity(input.services.len());
    for (i, raw) in input.services.iter().enumerate() {
        if let Some(service) = validate_service(raw, i + 1, &mut errors) {
            services.push(service);
        }
    }

    let mut availability_rules = Vec::with_capacity(input.availability_rules.len());
    for (i, raw) in input.availability_rules.iter().enumerate() {
        if let Some(rule) = validate_availability(raw, i + 1, &mut errors) {
            availability_rules.push(rule);
        }
    }

    errors.into_result(|| NewInstructor {
        user_id,
        specialty: specialty.to_string(),
        bio,
        profile_pic_url,
        is_available: input.is_available,
        services,
        availability_rules,
    })
}

fn validate_service(raw: &ServiceInput, row: usize, errors: &mut FieldErrors) -> Option<NewService> {
    let before = errors.get("services").len();

    let service_name = raw.service_name.trim();
    if char_len(service_name) < 3 {
        errors.add("services", format!("Service {row}: name is required (min 3 characters)."));
    }

    let duration_minutes = match parse_integer(&raw.duration_minutes) {
        Ok(d) if d >= MIN_SERVICE_MINUTES => Some(d),
        Ok(_) => {
            errors.add("services", format!("Service {row}: minimum duration is 15 minutes."));
            None
        }
        Err(message) => {
            errors.add("services", format!("Service {row}: {}", message.replace("{field}", "duration")));
            None
        }
    };

    let price = match raw.price.trim().parse::<f64>() {
        Ok(p) if p.is_finite() && p >= 0.0 => Some(p),
        Ok(p) if p.is_finite() => {
            errors.add("services", format!("Service {row}: price cannot be negative."));
            None
        }
        _ => {
            errors.add("services", format!("Service {row}: price must be a number."));
            None
        }
    };

    if errors.get("services").len() != before {
        return None;
    }
    Some(NewService {
        service_name: service_name.to_string(),
        duration_minutes: duration_minutes?,
        price: price?,
    })
}

fn validate_availability(
    raw: &AvailabilityInput,
    row: usize,
    errors: &mut FieldErrors,
) -> Option<NewAvailabilityRule> {
    let before = errors.get("availability_rules").len();

    let day_of_week = match parse_integer(&raw.day_of_week) {
        Ok(d @ 0..=6) => Some(d as u8),
        _ => {
            errors.add(
                "availability_rules",
                format!("Availability {row}: day of week must be between 0 and 6."),
            );
            None
        }
    };

    for (label, value) in [("start", &raw.start_time), ("end", &raw.end_time)] {
        if !TIME_REGEX.is_match(value.trim()) {
            errors.add(
                "availability_rules",
                format!("Availability {row}: invalid {label} time, use HH:MM."),
            );
        }
    }

    if errors.get("availability_rules").len() != before {
        return None;
    }
    Some(NewAvailabilityRule {
        day_of_week: day_of_week?,
        start_time: raw.start_time.trim().to_string(),
        end_time: raw.end_time.trim().to_string(),
    })
}

/// Parses a whole number, distinguishing "missing", "out of range",
/// "not a number" and "not an integer". `{field}` in the message is replaced
/// by the caller.
fn parse_integer(raw: &str) -> Result<i32, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("{field} is required.");
    }
    match raw.parse::<i32>() {
        Ok(n) => return Ok(n),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => return Err("{field} is too large."),
        Err(e) if *e.kind() == IntErrorKind::NegOverflow => return Err("{field} is too small."),
        Err(_) => {}
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Err("{field} must be a whole number."),
        _ => Err("{field} must be a number."),
    }
}
