//! Common types shared between the Sotaria API server and its clients

pub mod auth;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API group served by the Sotaria apiserver
pub const GROUP: &str = "sotaria.io";

/// Served API version
pub const VERSION: &str = "v1alpha1";

/// `apiVersion` value carried by every Sotaria object
pub const API_VERSION: &str = "sotaria.io/v1alpha1";

/// Plural resource name for projects
pub const PROJECTS_RESOURCE: &str = "projects";

/// Lifecycle phase of a namespace, mirrored onto its project
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum NamespacePhase {
    #[default]
    Active,
    Terminating,
}

impl NamespacePhase {
    /// Parse the phase string reported by the cluster.
    ///
    /// Unknown or missing phases are reported as `None` rather than guessed.
    pub fn from_phase(phase: &str) -> Option<Self> {
        match phase {
            "Active" => Some(Self::Active),
            "Terminating" => Some(Self::Terminating),
            _ => None,
        }
    }
}

impl std::fmt::Display for NamespacePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Terminating => write!(f, "Terminating"),
        }
    }
}

/// Object metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// List metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(rename = "continue", default, skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_item_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<NamespacePhase>,
}

/// User-facing view of a namespace the caller is allowed to see
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ProjectSpec,
    #[serde(default)]
    pub status: ProjectStatus,
}

impl Project {
    pub fn new(metadata: ObjectMeta, spec: ProjectSpec, status: ProjectStatus) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: "Project".to_string(),
            metadata,
            spec,
            status,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new(
            ObjectMeta::default(),
            ProjectSpec::default(),
            ProjectStatus::default(),
        )
    }
}

/// Ordered list of projects returned by a List call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectList {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<Project>,
}

impl ProjectList {
    pub fn new(items: Vec<Project>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: "ProjectList".to_string(),
            metadata: ListMeta::default(),
            items,
        }
    }
}

impl Default for ProjectList {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
