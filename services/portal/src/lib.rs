pub mod adapters;
pub mod config;
pub mod error;
pub mod web;

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::{rest::ApiDoc, state::AppState};

/// Builds the complete application router.
///
/// Every page, action and JSON route runs behind the session-refresh
/// interceptor; the Swagger UI does not.
pub fn build_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/", get(web::home_page))
        .route("/login", get(web::login_page).post(web::login_submit))
        .route("/signup", get(web::signup_page).post(web::signup_submit))
        .route("/logout", post(web::logout))
        .route(
            "/facilities",
            get(web::list_facilities_page).post(web::create_facility),
        )
        .route("/facilities/new", get(web::new_facility_page))
        .route(
            "/instructors",
            get(web::list_instructors_page).post(web::create_instructor),
        )
        .route("/instructors/new", get(web::new_instructor_page))
        .route("/api/facilities", get(web::list_facilities_handler))
        .route("/api/instructors", get(web::list_instructors_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            web::refresh_session,
        ))
        .with_state(state.clone());

    let mut app = Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = &state.config.cors_origin {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => {
                let cors = CorsLayer::new()
                    .allow_origin(origin)
                    .allow_credentials(true)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([CONTENT_TYPE, ACCEPT]);
                app = app.layer(cors);
            }
            Err(e) => warn!(%origin, error = %e, "ignoring invalid CORS_ORIGIN"),
        }
    }

    app
}
