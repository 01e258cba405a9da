//! Registry data types
//!
//! Directory records (namespaces, bindings), request options and the
//! per-request context carrying the caller identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sotaria_common::auth::UserInfo;
use sotaria_common::{NamespacePhase, ObjectMeta, Project, ProjectSpec, ProjectStatus};
use std::collections::BTreeMap;

/// Candidate resource from the namespace directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    pub name: String,
    pub uid: Option<String>,
    pub resource_version: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub finalizers: Vec<String>,
    pub phase: Option<NamespacePhase>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Project view of this namespace
    pub fn to_project(&self) -> Project {
        Project::new(
            ObjectMeta {
                name: self.name.clone(),
                generate_name: None,
                uid: self.uid.clone(),
                resource_version: self.resource_version.clone(),
                creation_timestamp: self.creation_timestamp,
                labels: self.labels.clone(),
                annotations: self.annotations.clone(),
            },
            ProjectSpec {
                finalizers: self.finalizers.clone(),
            },
            ProjectStatus { phase: self.phase },
        )
    }
}

/// Kind of identity referenced by a binding subject
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,
    /// Any kind this registry does not grant through
    #[serde(other)]
    Unknown,
}

impl From<&str> for SubjectKind {
    fn from(kind: &str) -> Self {
        match kind {
            "User" => SubjectKind::User,
            "Group" => SubjectKind::Group,
            "ServiceAccount" => SubjectKind::ServiceAccount,
            _ => SubjectKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::User,
            name: name.into(),
            namespace: None,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Group,
            name: name.into(),
            namespace: None,
        }
    }

    pub fn service_account(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::ServiceAccount,
            name: name.into(),
            namespace: namespace.map(String::from),
        }
    }
}

/// Role-binding record from the binding directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleBinding {
    pub name: String,
    pub role_name: String,
    pub subjects: Vec<Subject>,
    pub labels: BTreeMap<String, String>,
}

impl RoleBinding {
    pub fn new(name: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role_name: role_name.into(),
            ..Default::default()
        }
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subjects.push(subject);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Per-request context
///
/// Carries the identity resolved by the front proxy. `None` means the
/// request reached the registry without an authenticated caller.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user: Option<UserInfo>,
}

impl RequestContext {
    pub fn new(user: Option<UserInfo>) -> Self {
        Self { user }
    }

    pub fn with_user(user: UserInfo) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }
}

/// List and watch options
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
    pub limit: Option<usize>,
    #[serde(rename = "continue")]
    pub continue_token: Option<String>,
    pub resource_version: Option<String>,
    #[serde(default)]
    pub watch: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preconditions {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub resource_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOptions {
    #[serde(default)]
    pub preconditions: Option<Preconditions>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
    Error,
}

/// Event delivered on a project watch stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    pub object: serde_json::Value,
}

impl WatchEvent {
    pub fn project(event_type: WatchEventType, project: &Project) -> Self {
        Self {
            event_type,
            object: serde_json::to_value(project).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event_type: WatchEventType::Error,
            object: serde_json::json!({ "message": message.into() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_projection_copies_fields() {
        let created = Utc::now();
        let ns = Namespace {
            name: "proj-a".to_string(),
            uid: Some("uid-1".to_string()),
            resource_version: Some("42".to_string()),
            creation_timestamp: Some(created),
            finalizers: vec!["kubernetes".to_string()],
            phase: Some(NamespacePhase::Terminating),
            ..Default::default()
        }
        .with_label("security.sotaria.io/role", "dev");

        let project = ns.to_project();
        assert_eq!(project.name(), "proj-a");
        assert_eq!(project.kind, "Project");
        assert_eq!(project.metadata.creation_timestamp, Some(created));
        assert_eq!(project.metadata.uid.as_deref(), Some("uid-1"));
        assert_eq!(project.spec.finalizers, vec!["kubernetes".to_string()]);
        assert_eq!(project.status.phase, Some(NamespacePhase::Terminating));
        assert_eq!(
            project.metadata.labels.get("security.sotaria.io/role"),
            Some(&"dev".to_string())
        );
    }

    #[test]
    fn test_subject_kind_from_str() {
        assert_eq!(SubjectKind::from("User"), SubjectKind::User);
        assert_eq!(SubjectKind::from("Group"), SubjectKind::Group);
        assert_eq!(SubjectKind::from("ServiceAccount"), SubjectKind::ServiceAccount);
        assert_eq!(SubjectKind::from("Robot"), SubjectKind::Unknown);
    }

    #[test]
    fn test_list_options_query_names() {
        let opts: ListOptions = serde_json::from_value(serde_json::json!({
            "labelSelector": "env=prod",
            "limit": 5,
            "continue": "abc",
            "watch": true
        }))
        .unwrap();

        assert_eq!(opts.label_selector.as_deref(), Some("env=prod"));
        assert_eq!(opts.limit, Some(5));
        assert_eq!(opts.continue_token.as_deref(), Some("abc"));
        assert!(opts.watch);
    }

    #[test]
    fn test_watch_event_wire_shape() {
        let event = WatchEvent::project(WatchEventType::Added, &Project::default());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ADDED");
        assert_eq!(json["object"]["kind"], "Project");

        let err = WatchEvent::error("too old");
        assert_eq!(serde_json::to_value(&err).unwrap()["type"], "ERROR");
    }
}
