//! HTTP surface
//!
//! Project routes under the aggregated API group path, discovery documents,
//! and the health probes.

pub mod discovery;
pub mod projects;

use crate::middleware;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use sotaria_common::{API_VERSION, GROUP};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Path prefix of the served group version
pub fn group_version_path() -> String {
    format!("/apis/{}", API_VERSION)
}

fn project_routes() -> Router<Arc<AppState>> {
    let base = group_version_path();
    Router::new()
        .route(
            &format!("{}/projects", base),
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            &format!("{}/projects/:name", base),
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
}

fn discovery_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/apis", get(discovery::api_group_list))
        .route(&format!("/apis/{}", GROUP), get(discovery::api_group))
        .route(&group_version_path(), get(discovery::api_resource_list))
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .merge(project_routes())
        .merge(discovery_routes())
        .with_state(state.clone())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::identity::identity_middleware,
        ));

    Router::new()
        .route("/healthz", get(liveness_probe))
        .route("/readyz", get(readiness_probe))
        .with_state(state)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

async fn liveness_probe(
    State(state): State<Arc<AppState>>,
) -> Json<crate::health::LivenessResponse> {
    Json(state.health.liveness())
}

async fn readiness_probe(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<crate::health::ReadinessResponse>) {
    let components = state.health.check_directories(&state.registry);
    let response = state.health.readiness(components);

    let status = if response.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
