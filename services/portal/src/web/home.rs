//! services/portal/src/web/home.rs

use axum::{extract::State, response::Response};
use std::sync::Arc;

use crate::web::cookies::SessionCookies;
use crate::web::helpers::current_user;
use crate::web::state::AppState;
use crate::web::templates::{render_template, Header, HomeTemplate};

pub async fn home_page(State(state): State<Arc<AppState>>, cookies: SessionCookies) -> Response {
    let client = state.factory.bind(cookies.read_only());
    let user = current_user(client.as_ref()).await;
    render_template(HomeTemplate {
        header: Header::for_user(user.as_ref()),
    })
}
