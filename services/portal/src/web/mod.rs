pub mod auth;
pub mod cache;
pub mod cookies;
pub mod facilities;
pub mod forms;
pub mod helpers;
pub mod home;
pub mod instructors;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod templates;

// Re-export the handlers so the router can be assembled in one place.
pub use auth::{login_page, login_submit, logout, signup_page, signup_submit};
pub use facilities::{create_facility, list_facilities_page, new_facility_page};
pub use home::home_page;
pub use instructors::{create_instructor, list_instructors_page, new_instructor_page};
pub use middleware::refresh_session;
pub use rest::{list_facilities_handler, list_instructors_handler};
