/*
 * Responsibility
 * - v1 URL layout
 * - Each protected group is bound to one operation; its requirement comes from config
 */
use axum::{Router, routing::get};

use crate::config::ConfigError;
use crate::middleware::auth::access::protect;
use crate::services::auth::authz::bindings::{ADMIN_READ, DOCUMENTS_READ, PROFILE_READ};
use crate::state::AppState;

use crate::api::v1::handlers::{admin::admin, documents::get_document, me::me};

pub fn routes(state: AppState) -> Result<Router<AppState>, ConfigError> {
    let profile_routes = protect(Router::new().route("/me", get(me)), state.clone(), PROFILE_READ)?;
    let admin_routes =
        protect(Router::new().route("/admin", get(admin)), state.clone(), ADMIN_READ)?;
    let document_routes = protect(
        Router::new().route("/documents/{document_id}", get(get_document)),
        state,
        DOCUMENTS_READ,
    )?;

    Ok(Router::new()
        .merge(profile_routes)
        .merge(admin_routes)
        .merge(document_routes))
}
