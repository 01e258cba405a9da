//! Project handlers
//!
//! Thin adapters between HTTP and the project registry. Identity comes from
//! the request context attached by the identity middleware.

use crate::error::ApiError;
use crate::registry::{DeleteOptions, ListOptions, RequestContext, WatchStream};
use crate::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures::StreamExt;
use sotaria_common::{Project, API_VERSION};
use std::sync::Arc;
use tracing::info;

const WATCH_CONTENT_TYPE: &str = "application/json;stream=watch";

/// GET .../projects, or a watch when `watch=true`
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<ListOptions>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(options) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if options.watch {
        let events = state.registry.watch(&ctx, &options).await?;
        return Ok(watch_response(events));
    }

    let list = state.registry.list(&ctx, &options).await?;
    Ok(Json(list).into_response())
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(name): Path<String>,
) -> Result<Json<Project>, ApiError> {
    let project = state.registry.get(&ctx, &name).await?;
    Ok(Json(project))
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = decode_project(&body)?;
    let created = state.registry.create(&ctx, project, None).await?;

    info!(project = %created.name(), "Project created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = decode_project(&body)?;
    let (updated, created) = state
        .registry
        .update(&ctx, &name, project, None, None, false)
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(updated)))
}

/// DELETE .../projects/{name}, with an optional `DeleteOptions` body
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let options: DeleteOptions = if body.iter().all(u8::is_ascii_whitespace) {
        DeleteOptions::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let (deleted, immediate) = state
        .registry
        .delete(&ctx, &name, None, &options)
        .await?;

    info!(project = %deleted.name(), "Project deleted");
    let status = if immediate {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(deleted)))
}

fn decode_project(body: &[u8]) -> Result<Project, ApiError> {
    let project: Project = serde_json::from_slice(body)?;
    if project.api_version != API_VERSION || project.kind != "Project" {
        return Err(ApiError::BadRequest(format!(
            "expected {}, Kind=Project but got {}, Kind={}",
            API_VERSION, project.api_version, project.kind
        )));
    }
    Ok(project)
}

/// Newline-delimited JSON watch events
fn watch_response(events: WatchStream) -> Response {
    let lines = events.map(|event| {
        serde_json::to_vec(&event).map(|mut line| {
            line.push(b'\n');
            line
        })
    });

    (
        [(header::CONTENT_TYPE, WATCH_CONTENT_TYPE)],
        Body::from_stream(lines),
    )
        .into_response()
}
