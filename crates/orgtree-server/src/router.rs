//! Router construction for the orgtree server.

use std::sync::Arc;

use axum::{middleware as axum_mw, routing::get, Extension, Router};
use orgtree_core::controller::ResourceController;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::jwt::{jwt_auth, JwtConfig};
use crate::state::AppState;

/// One CRUD surface. The kind-specific controller rides along as a route
/// extension so a single set of handlers serves every resource kind.
fn resource_routes(prefix: &str, controller: Arc<ResourceController>) -> Router<AppState> {
    Router::new()
        .route(
            prefix,
            get(handlers::resources::list).post(handlers::resources::create),
        )
        .route(
            &format!("{prefix}/:oid"),
            get(handlers::resources::get_one)
                .put(handlers::resources::replace)
                .delete(handlers::resources::remove),
        )
        .layer(Extension(controller))
}

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: AppState, jwt_config: JwtConfig) -> Router {
    // Routes that require JWT authentication
    let protected = Router::new()
        .merge(resource_routes("/api/ous", state.ous.clone()))
        .merge(resource_routes("/api/computers", state.computers.clone()))
        .merge(resource_routes("/api/users", state.users.clone()))
        .merge(resource_routes("/api/groups", state.groups.clone()))
        .route(
            "/api/jobs/:oid",
            get(handlers::jobs::get_job).put(handlers::jobs::update_job),
        )
        .layer(axum_mw::from_fn(jwt_auth))
        .layer(Extension(jwt_config));

    // Public routes (no auth)
    let public = Router::new().route("/health", get(handlers::health::health));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
