pub mod authz;
pub mod domain;
pub mod ports;
pub mod roles;
pub mod validation;

pub use authz::{AuthorizationGate, Denial};
pub use domain::{
    Facility, FacilityStatus, Instructor, NewAvailabilityRule, NewFacility, NewInstructor,
    NewService, Profile, Session, User, UserMetadata,
};
pub use ports::{
    AuthService, BackendClient, ClientFactory, CookieOptions, CookieWrite, DatabaseService,
    PortError, PortResult, SameSitePolicy, SessionStore,
};
pub use roles::{Role, RoleMatch, RoleTable};
