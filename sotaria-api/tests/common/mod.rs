//! Common test utilities and helpers

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sotaria_api::config::SotariaConfig;
use sotaria_api::registry::{
    MemoryBindingDirectory, MemoryNamespaceDirectory, MemoryProjectStore, Namespace,
    ProjectRegistry, RoleBinding, ROLE_LABEL, TYPE_LABEL,
};
use sotaria_api::{api, AppState};
use std::sync::Arc;
use tower::ServiceExt;

pub const PROJECTS_PATH: &str = "/apis/sotaria.io/v1alpha1/projects";

/// Namespace carrying the project type label and a role label
pub fn project_namespace(name: &str, role: &str) -> Namespace {
    Namespace::new(name)
        .with_label(TYPE_LABEL, "project")
        .with_label(ROLE_LABEL, role)
}

/// Cluster role binding carrying the project type label
pub fn project_binding(name: &str, role: &str) -> RoleBinding {
    RoleBinding::new(name, role).with_label(TYPE_LABEL, "project")
}

/// Caller identity sent through the front-proxy headers
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub user: Option<String>,
    pub groups: Vec<String>,
}

impl Caller {
    pub fn user(name: &str, groups: &[&str]) -> Self {
        Self {
            user: Some(name.to_string()),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Router over in-memory directories and store
pub struct TestEnv {
    pub namespaces: MemoryNamespaceDirectory,
    pub bindings: MemoryBindingDirectory,
    pub app: Router,
}

impl TestEnv {
    pub fn new(namespaces: Vec<Namespace>, bindings: Vec<RoleBinding>) -> Self {
        let namespaces = MemoryNamespaceDirectory::with_namespaces(namespaces);
        let bindings = MemoryBindingDirectory::with_bindings(bindings);

        let registry = ProjectRegistry::new(
            Arc::new(MemoryProjectStore::new()),
            Arc::new(namespaces.clone()),
            Arc::new(bindings.clone()),
        );
        let state = Arc::new(AppState::new(SotariaConfig::default(), registry));

        Self {
            namespaces,
            bindings,
            app: api::router(state),
        }
    }

    pub fn request(&self, method: Method, uri: &str, caller: &Caller, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(ref user) = caller.user {
            builder = builder.header("X-Remote-User", user);
        }
        for group in &caller.groups {
            builder = builder.header("X-Remote-Group", group);
        }

        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    /// Send a request and decode the JSON response body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: &Caller,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(self.request(method, uri, caller, body))
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn list(&self, query: &str, caller: &Caller) -> (StatusCode, Value) {
        let uri = if query.is_empty() {
            PROJECTS_PATH.to_string()
        } else {
            format!("{}?{}", PROJECTS_PATH, query)
        };
        self.send(Method::GET, &uri, caller, None).await
    }
}

/// Project names in a list response
pub fn item_names(list: &Value) -> Vec<String> {
    list["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|p| p["metadata"]["name"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

pub fn project_body(name: &str) -> Value {
    serde_json::json!({
        "apiVersion": "sotaria.io/v1alpha1",
        "kind": "Project",
        "metadata": { "name": name }
    })
}
