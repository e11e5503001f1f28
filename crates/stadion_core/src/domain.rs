//! crates/stadion_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any HTTP client or storage format; the
//! serde derives only describe the shape the hosted backend speaks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::roles::Role;

//=========================================================================================
// Identity and Session
//=========================================================================================

/// Free-form metadata attached to a user at sign-up.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// An authenticated identity, as reported by the hosted auth service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// The credential pair carried in the auth cookie.
///
/// The application never inspects the tokens; it only relays them and
/// decides when a refresh is due from `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) at which `access_token` stops being accepted.
    pub expires_at: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Whether the access token expires within `margin_secs` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        self.expires_at - now.timestamp() <= margin_secs
    }
}

/// The denormalized role record used for authorization queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    /// Raw stored value. Interpreted only through `RoleTable`.
    #[serde(default)]
    pub user_role: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

//=========================================================================================
// Facilities
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacilityStatus {
    Available,
    Occupied,
    Maintenance,
}

impl FacilityStatus {
    /// Parses a stored status, returning `None` for anything unrecognised.
    pub fn from_stored(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" | "active" => Some(Self::Available),
            "occupied" => Some(Self::Occupied),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

impl fmt::Display for FacilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Available => "Available",
            Self::Occupied => "Occupied",
            Self::Maintenance => "Maintenance",
        };
        f.write_str(label)
    }
}

/// A sports facility as listed to visitors.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub facility_type: String,
    pub capacity: Option<i32>,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub operating_hours_info: Option<String>,
    pub status: Option<FacilityStatus>,
    pub manager_id: Uuid,
    pub manager_name: Option<String>,
}

/// A validated facility ready to be inserted on behalf of `manager_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewFacility {
    pub name: String,
    pub address: String,
    #[serde(rename = "type")]
    pub facility_type: String,
    pub capacity: i32,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub operating_hours_info: Option<String>,
    pub manager_id: Uuid,
}

//=========================================================================================
// Instructors
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Instructor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialty: Option<String>,
    pub bio: Option<String>,
    pub profile_pic_url: Option<String>,
    pub is_available: bool,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A priced service offered by an instructor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewService {
    pub service_name: String,
    pub duration_minutes: i32,
    pub price: f64,
}

/// A recurring weekly window during which an instructor can be booked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAvailabilityRule {
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
}

/// An instructor profile together with its dependent rows.
///
/// Stored as a unit: either all rows exist afterwards or none do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewInstructor {
    pub user_id: Uuid,
    pub specialty: String,
    pub bio: Option<String>,
    pub profile_pic_url: Option<String>,
    pub is_available: bool,
    pub services: Vec<NewService>,
    pub availability_rules: Vec<NewAvailabilityRule>,
}

/// Roles a visitor may pick when creating an account.
pub const SIGNUP_ROLES: [Role; 3] = [Role::User, Role::FacilityManager, Role::Instructor];

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(expires_at: i64) -> Session {
        Session {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at,
            token_type: "bearer".into(),
            user: User {
                id: Uuid::nil(),
                email: None,
                user_metadata: UserMetadata::default(),
            },
        }
    }

    #[test]
    fn session_expiry_margin() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert!(session(1_005).expires_within(now, 10));
        assert!(session(900).expires_within(now, 10));
        assert!(!session(1_100).expires_within(now, 10));
    }

    #[test]
    fn facility_status_accepts_known_values_only() {
        assert_eq!(FacilityStatus::from_stored("Available"), Some(FacilityStatus::Available));
        assert_eq!(FacilityStatus::from_stored("Active"), Some(FacilityStatus::Available));
        assert_eq!(FacilityStatus::from_stored(" maintenance "), Some(FacilityStatus::Maintenance));
        assert_eq!(FacilityStatus::from_stored("closed"), None);
    }

    #[test]
    fn new_facility_serializes_type_column() {
        let facility = NewFacility {
            name: "Quadra A".into(),
            address: "Rua X, 123".into(),
            facility_type: "Quadra".into(),
            capacity: 50,
            description: None,
            contact_phone: None,
            contact_email: None,
            operating_hours_info: None,
            manager_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&facility).unwrap();
        assert_eq!(json["type"], "Quadra");
        assert!(json.get("facility_type").is_none());
    }
}
