//! Namespace and binding directories
//!
//! Read-only, label-queryable views over the candidate namespaces and the
//! role bindings. The registry only ever calls `list`; how the view is kept
//! fresh is up to the implementation (a watch-fed cache in production, a
//! plain in-memory snapshot in tests and standalone mode).

use super::error::RegistryResult;
use super::selector::LabelSelector;
use super::types::{Namespace, RoleBinding};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Label-queryable view of candidate namespaces
#[async_trait]
pub trait NamespaceDirectory: Send + Sync {
    /// List namespaces matching the selector, in the directory's enumeration order
    async fn list(&self, selector: &LabelSelector) -> RegistryResult<Vec<Namespace>>;

    /// Whether the directory has completed its initial sync
    fn has_synced(&self) -> bool {
        true
    }
}

/// Label-queryable view of role bindings
#[async_trait]
pub trait BindingDirectory: Send + Sync {
    async fn list(&self, selector: &LabelSelector) -> RegistryResult<Vec<RoleBinding>>;

    fn has_synced(&self) -> bool {
        true
    }
}

/// In-memory namespace directory
///
/// Enumerates in insertion order; re-inserting a name replaces it in place.
#[derive(Clone, Default)]
pub struct MemoryNamespaceDirectory {
    namespaces: Arc<RwLock<Vec<Namespace>>>,
}

impl MemoryNamespaceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespaces(namespaces: Vec<Namespace>) -> Self {
        Self {
            namespaces: Arc::new(RwLock::new(namespaces)),
        }
    }

    pub async fn upsert(&self, namespace: Namespace) {
        let mut namespaces = self.namespaces.write().await;
        match namespaces.iter_mut().find(|ns| ns.name == namespace.name) {
            Some(existing) => *existing = namespace,
            None => namespaces.push(namespace),
        }
    }

    pub async fn remove(&self, name: &str) -> bool {
        let mut namespaces = self.namespaces.write().await;
        let before = namespaces.len();
        namespaces.retain(|ns| ns.name != name);
        namespaces.len() != before
    }
}

#[async_trait]
impl NamespaceDirectory for MemoryNamespaceDirectory {
    async fn list(&self, selector: &LabelSelector) -> RegistryResult<Vec<Namespace>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .iter()
            .filter(|ns| selector.matches(&ns.labels))
            .cloned()
            .collect())
    }
}

/// In-memory binding directory
#[derive(Clone, Default)]
pub struct MemoryBindingDirectory {
    bindings: Arc<RwLock<Vec<RoleBinding>>>,
}

impl MemoryBindingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bindings(bindings: Vec<RoleBinding>) -> Self {
        Self {
            bindings: Arc::new(RwLock::new(bindings)),
        }
    }

    pub async fn upsert(&self, binding: RoleBinding) {
        let mut bindings = self.bindings.write().await;
        match bindings.iter_mut().find(|b| b.name == binding.name) {
            Some(existing) => *existing = binding,
            None => bindings.push(binding),
        }
    }

    pub async fn remove(&self, name: &str) -> bool {
        let mut bindings = self.bindings.write().await;
        let before = bindings.len();
        bindings.retain(|b| b.name != name);
        bindings.len() != before
    }
}

#[async_trait]
impl BindingDirectory for MemoryBindingDirectory {
    async fn list(&self, selector: &LabelSelector) -> RegistryResult<Vec<RoleBinding>> {
        let bindings = self.bindings.read().await;
        Ok(bindings
            .iter()
            .filter(|b| selector.matches(&b.labels))
            .cloned()
            .collect())
    }
}
