pub mod auth_cookie;
pub mod backend;
pub mod postgrest;

pub use backend::{HostedBackendClient, HostedBackendFactory};
