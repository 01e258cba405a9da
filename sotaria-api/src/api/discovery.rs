//! API discovery documents
//!
//! Minimal `APIGroupList`, `APIGroup` and `APIResourceList` responses so
//! that clients going through the aggregation layer can find the
//! projects resource.

use crate::registry::ProjectStrategy;
use axum::Json;
use serde_json::{json, Value};
use sotaria_common::{API_VERSION, GROUP, PROJECTS_RESOURCE, VERSION};

fn group_document() -> Value {
    let version = json!({ "groupVersion": API_VERSION, "version": VERSION });
    json!({
        "kind": "APIGroup",
        "apiVersion": "v1",
        "name": GROUP,
        "versions": [version.clone()],
        "preferredVersion": version,
    })
}

pub async fn api_group_list() -> Json<Value> {
    let mut group = group_document();
    if let Some(obj) = group.as_object_mut() {
        obj.remove("kind");
        obj.remove("apiVersion");
    }
    Json(json!({
        "kind": "APIGroupList",
        "apiVersion": "v1",
        "groups": [group],
    }))
}

pub async fn api_group() -> Json<Value> {
    Json(group_document())
}

pub async fn api_resource_list() -> Json<Value> {
    Json(json!({
        "kind": "APIResourceList",
        "apiVersion": "v1",
        "groupVersion": API_VERSION,
        "resources": [{
            "name": PROJECTS_RESOURCE,
            "singularName": "project",
            "namespaced": ProjectStrategy.namespace_scoped(),
            "kind": "Project",
            "verbs": ["create", "delete", "get", "list", "update", "watch"],
        }],
    }))
}
