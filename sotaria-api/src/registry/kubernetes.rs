//! Kubernetes-backed directories
//!
//! Namespaces and cluster role bindings are mirrored into reflector caches
//! restricted to project-labeled objects. Listing reads the cache only;
//! snapshots are sorted by name so repeated lists enumerate identically.

use super::directory::{BindingDirectory, NamespaceDirectory};
use super::error::{RegistryError, RegistryResult};
use super::resolver::PROJECT_SELECTOR;
use super::selector::LabelSelector;
use super::types::{Namespace, RoleBinding, Subject, SubjectKind};
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace as K8sNamespace;
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use kube::api::Api;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::reflector::{self, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, Config, Resource};
use serde::de::DeserializeOwned;
use sotaria_common::NamespacePhase;
use std::fmt::Debug;
use std::hash::Hash;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Build a client from an explicit kubeconfig, a named context, or the
/// ambient configuration (KUBECONFIG, ~/.kube/config, in-cluster)
pub async fn build_client(kubeconfig: Option<&Path>, context: Option<&str>) -> RegistryResult<Client> {
    let options = KubeConfigOptions {
        context: context.map(String::from),
        ..Default::default()
    };

    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                config_error(format!("failed to read kubeconfig {}: {}", path.display(), e))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| config_error(format!("failed to load kubeconfig: {}", e)))?
        }
        None if context.is_some() => Config::from_kubeconfig(&options)
            .await
            .map_err(|e| config_error(format!("failed to load kubeconfig: {}", e)))?,
        None => Config::infer()
            .await
            .map_err(|e| config_error(format!("failed to infer client config: {}", e)))?,
    };

    info!(cluster = %config.cluster_url, "Connecting to Kubernetes API server");
    Client::try_from(config).map_err(RegistryError::from)
}

fn config_error(message: String) -> RegistryError {
    RegistryError::Directory {
        directory: "kubernetes",
        message,
    }
}

/// Watch-fed cache of one resource kind
struct ReflectedCache<K>
where
    K: Resource + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    kind: &'static str,
    store: Store<K>,
    synced: Arc<AtomicBool>,
}

impl<K> ReflectedCache<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    fn spawn(api: Api<K>, kind: &'static str) -> Self {
        let (store, writer) = reflector::store();
        let config = watcher::Config::default().labels(PROJECT_SELECTOR);

        let mut events = watcher(api, config)
            .default_backoff()
            .reflect(writer)
            .applied_objects()
            .boxed();

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    warn!(kind, error = %e, "Directory watch error");
                }
            }
            debug!(kind, "Directory watch stream ended");
        });

        let synced = Arc::new(AtomicBool::new(false));
        let reader = store.clone();
        let flag = synced.clone();
        tokio::spawn(async move {
            if reader.wait_until_ready().await.is_ok() {
                flag.store(true, Ordering::SeqCst);
                info!(kind, objects = reader.len(), "Directory cache synced");
            }
        });

        Self {
            kind,
            store,
            synced,
        }
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    async fn wait_synced(&self, timeout: Duration) -> RegistryResult<()> {
        match tokio::time::timeout(timeout, self.store.wait_until_ready()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RegistryError::Directory {
                directory: self.kind,
                message: format!("cache writer dropped: {}", e),
            }),
            Err(_) => Err(RegistryError::Directory {
                directory: self.kind,
                message: format!("cache did not sync within {}s", timeout.as_secs()),
            }),
        }
    }

    fn snapshot(&self) -> RegistryResult<Vec<Arc<K>>> {
        if !self.has_synced() {
            return Err(RegistryError::Directory {
                directory: self.kind,
                message: "cache has not synced".to_string(),
            });
        }
        Ok(self.store.state())
    }
}

/// Namespace directory backed by a reflector cache
pub struct KubeNamespaceDirectory {
    cache: ReflectedCache<K8sNamespace>,
}

impl KubeNamespaceDirectory {
    pub fn spawn(client: Client) -> Self {
        Self {
            cache: ReflectedCache::spawn(Api::all(client), "namespace"),
        }
    }

    pub async fn wait_synced(&self, timeout: Duration) -> RegistryResult<()> {
        self.cache.wait_synced(timeout).await
    }
}

#[async_trait]
impl NamespaceDirectory for KubeNamespaceDirectory {
    async fn list(&self, selector: &LabelSelector) -> RegistryResult<Vec<Namespace>> {
        let mut namespaces: Vec<Namespace> = self
            .cache
            .snapshot()?
            .iter()
            .map(|ns| namespace_from_k8s(ns))
            .filter(|ns| selector.matches(&ns.labels))
            .collect();
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(namespaces)
    }

    fn has_synced(&self) -> bool {
        self.cache.has_synced()
    }
}

/// Binding directory backed by a reflector cache of cluster role bindings
pub struct KubeBindingDirectory {
    cache: ReflectedCache<ClusterRoleBinding>,
}

impl KubeBindingDirectory {
    pub fn spawn(client: Client) -> Self {
        Self {
            cache: ReflectedCache::spawn(Api::all(client), "clusterrolebinding"),
        }
    }

    pub async fn wait_synced(&self, timeout: Duration) -> RegistryResult<()> {
        self.cache.wait_synced(timeout).await
    }
}

#[async_trait]
impl BindingDirectory for KubeBindingDirectory {
    async fn list(&self, selector: &LabelSelector) -> RegistryResult<Vec<RoleBinding>> {
        let mut bindings: Vec<RoleBinding> = self
            .cache
            .snapshot()?
            .iter()
            .map(|b| binding_from_k8s(b))
            .filter(|b| selector.matches(&b.labels))
            .collect();
        bindings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(bindings)
    }

    fn has_synced(&self) -> bool {
        self.cache.has_synced()
    }
}

/// Convert a Kubernetes namespace into a directory record
pub fn namespace_from_k8s(ns: &K8sNamespace) -> Namespace {
    let metadata = &ns.metadata;
    Namespace {
        name: metadata.name.clone().unwrap_or_default(),
        uid: metadata.uid.clone(),
        resource_version: metadata.resource_version.clone(),
        labels: metadata.labels.clone().unwrap_or_default(),
        annotations: metadata.annotations.clone().unwrap_or_default(),
        creation_timestamp: metadata.creation_timestamp.as_ref().map(|t| t.0),
        finalizers: ns
            .spec
            .as_ref()
            .and_then(|s| s.finalizers.clone())
            .unwrap_or_default(),
        phase: ns
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .and_then(NamespacePhase::from_phase),
    }
}

/// Convert a cluster role binding into a directory record
pub fn binding_from_k8s(binding: &ClusterRoleBinding) -> RoleBinding {
    let subjects = binding
        .subjects
        .as_ref()
        .map(|subjects| {
            subjects
                .iter()
                .map(|s| Subject {
                    kind: SubjectKind::from(s.kind.as_str()),
                    name: s.name.clone(),
                    namespace: s.namespace.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    RoleBinding {
        name: binding.metadata.name.clone().unwrap_or_default(),
        role_name: binding.role_ref.name.clone(),
        subjects,
        labels: binding.metadata.labels.clone().unwrap_or_default(),
    }
}
