//! crates/stadion_core/src/roles.rs
//!
//! The closed set of roles and the single table that maps stored spellings
//! onto them. Nothing else in the workspace compares raw role strings.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    FacilityManager,
    Instructor,
}

impl Role {
    /// The canonical value stored in `profiles.user_role`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::FacilityManager => "FACILITY_MANAGER",
            Self::Instructor => "INSTRUCTOR",
        }
    }

    /// Human label used by the sign-up role picker.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "Standard user",
            Self::FacilityManager => "Facility manager",
            Self::Instructor => "Instructor",
        }
    }

    /// Parses a canonical value only. Used for input we produce ourselves.
    pub fn from_canonical(raw: &str) -> Option<Self> {
        match raw {
            "USER" => Some(Self::User),
            "FACILITY_MANAGER" => Some(Self::FacilityManager),
            "INSTRUCTOR" => Some(Self::Instructor),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stored role string relates to a requested role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMatch {
    /// Stored value is exactly the canonical spelling.
    Canonical,
    /// Stored value is a tolerated legacy spelling of the role.
    Synonym,
    /// Stored value names some other role, or nothing at all.
    NoMatch,
}

/// Legacy spellings of the instructor role, compared trimmed and lowercased.
const INSTRUCTOR_SYNONYMS: [&str; 3] = ["instructor", "instrutor", "professor"];

/// Maps stored role strings onto `Role`.
///
/// `FACILITY_MANAGER` and `USER` are matched exactly, case and whitespace
/// included. The instructor role additionally accepts the legacy synonyms.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleTable;

impl RoleTable {
    pub fn classify(&self, stored: Option<&str>, wanted: Role) -> RoleMatch {
        let Some(stored) = stored else {
            return RoleMatch::NoMatch;
        };
        if stored == wanted.as_str() {
            return RoleMatch::Canonical;
        }
        if wanted == Role::Instructor {
            let folded = stored.trim().to_lowercase();
            if INSTRUCTOR_SYNONYMS.contains(&folded.as_str()) {
                return RoleMatch::Synonym;
            }
        }
        RoleMatch::NoMatch
    }

    /// Resolves a stored value to a role, if it names one.
    pub fn resolve(&self, stored: Option<&str>) -> Option<Role> {
        [Role::FacilityManager, Role::Instructor, Role::User]
            .into_iter()
            .find(|role| self.classify(stored, *role) != RoleMatch::NoMatch)
    }
}
