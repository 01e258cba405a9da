//! Caller identity middleware
//!
//! The aggregation layer authenticates the caller and forwards the result in
//! front-proxy headers. This middleware turns those headers into the request
//! context consumed by the registry. It does not authenticate.
//!
//! The headers are trusted from any connection. The server must only be
//! reachable through the authenticating front proxy, which strips and
//! rewrites them; a client that can reach the port directly can claim any
//! user or group, including `system:masters`.

use crate::config::IdentityConfig;
use crate::registry::RequestContext;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use sotaria_common::auth::UserInfo;
use std::sync::Arc;
use tracing::debug;

/// Caller identity from the configured headers
///
/// The username is the first non-empty value of the username headers. Groups
/// are every value of every group header, with comma-separated lists split.
/// Without a username there is no identity.
pub fn user_from_headers(headers: &HeaderMap, config: &IdentityConfig) -> Option<UserInfo> {
    let name = config
        .username_headers
        .iter()
        .flat_map(|h| headers.get_all(h.as_str()))
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .find(|v| !v.is_empty())?;

    let groups: Vec<&str> = config
        .group_headers
        .iter()
        .flat_map(|h| headers.get_all(h.as_str()))
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .collect();

    Some(UserInfo::new(name, groups))
}

/// Attach a `RequestContext` to every request
pub async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = match user_from_headers(request.headers(), &state.config.identity) {
        Some(user) => {
            debug!(user = %user.name, groups = user.groups.len(), "Request identity");
            RequestContext::with_user(user)
        }
        None => RequestContext::anonymous(),
    };

    request.extensions_mut().insert(ctx);
    next.run(request).await
}
