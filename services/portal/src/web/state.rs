//! services/portal/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::cache::ListingCache;
use stadion_core::ports::ClientFactory;
use stadion_core::AuthorizationGate;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// Holds no per-request data: backend clients are bound to each request's
/// cookies through `factory`.
#[derive(Clone)]
pub struct AppState {
    pub factory: Arc<dyn ClientFactory>,
    pub config: Arc<Config>,
    pub gate: AuthorizationGate,
    pub cache: Arc<ListingCache>,
}

impl AppState {
    pub fn new(factory: Arc<dyn ClientFactory>, config: Arc<Config>) -> Self {
        Self {
            gate: AuthorizationGate::new(config.legacy_role_rewrite),
            cache: Arc::new(ListingCache::new(config.listing_cache_ttl)),
            factory,
            config,
        }
    }
}
