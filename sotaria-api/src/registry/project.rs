//! Project registry
//!
//! Fronts the project store. Every verb is delegated to the store as-is,
//! except List, which is answered from the namespace and binding
//! directories through the visibility resolver.

use super::directory::{BindingDirectory, NamespaceDirectory};
use super::error::{RegistryError, RegistryResult};
use super::resolver::{self, PROJECT_SELECTOR};
use super::selector::{parse_selectors, LabelSelector};
use super::store::{ProjectStore, ValidateObjectFn, ValidateObjectUpdateFn, WatchStream};
use super::strategy::ProjectPredicate;
use super::types::{DeleteOptions, ListOptions, RequestContext};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sotaria_common::{Project, ProjectList, GROUP, PROJECTS_RESOURCE};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

/// Position in the visible sequence, bound to the selectors it was issued for
#[derive(Debug, Serialize, Deserialize)]
struct ContinueToken {
    offset: usize,
    selectors: u64,
}

/// Fingerprint of the caller's label and field selectors
fn selector_fingerprint(options: &ListOptions) -> u64 {
    let mut hasher = DefaultHasher::new();
    options.label_selector.as_deref().unwrap_or_default().hash(&mut hasher);
    options.field_selector.as_deref().unwrap_or_default().hash(&mut hasher);
    hasher.finish()
}

fn encode_continue(offset: usize, selectors: u64) -> RegistryResult<String> {
    let raw = serde_json::to_vec(&ContinueToken { offset, selectors })
        .map_err(|e| RegistryError::Internal(format!("encoding continue token: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

fn decode_continue(token: &str, selectors: u64) -> RegistryResult<usize> {
    let invalid = || RegistryError::BadRequest(format!("invalid continue token \"{}\"", token));
    let raw = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
    let parsed: ContinueToken = serde_json::from_slice(&raw).map_err(|_| invalid())?;
    if parsed.selectors != selectors {
        return Err(RegistryError::BadRequest(
            "continue token was issued for different label or field selectors".to_string(),
        ));
    }
    Ok(parsed.offset)
}

/// Cut one page out of the filtered project sequence
fn paginate(items: Vec<Project>, options: &ListOptions) -> RegistryResult<ProjectList> {
    let selectors = selector_fingerprint(options);
    let total = items.len();
    let offset = match options.continue_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => decode_continue(token, selectors)?.min(total),
        None => 0,
    };
    let end = match options.limit.filter(|l| *l > 0) {
        Some(limit) => offset.saturating_add(limit).min(total),
        None => total,
    };

    let page: Vec<Project> = items.into_iter().skip(offset).take(end - offset).collect();
    let mut list = ProjectList::new(page);
    if end < total {
        list.metadata.continue_token = Some(encode_continue(end, selectors)?);
        list.metadata.remaining_item_count = Some((total - end) as i64);
    }
    Ok(list)
}

/// Storage proxy for projects
#[derive(Clone)]
pub struct ProjectRegistry {
    store: Arc<dyn ProjectStore>,
    namespaces: Arc<dyn NamespaceDirectory>,
    bindings: Arc<dyn BindingDirectory>,
}

impl ProjectRegistry {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        namespaces: Arc<dyn NamespaceDirectory>,
        bindings: Arc<dyn BindingDirectory>,
    ) -> Self {
        Self {
            store,
            namespaces,
            bindings,
        }
    }

    /// Qualified resource name used in authorization errors
    pub fn qualified_resource() -> String {
        format!("{}.{}", PROJECTS_RESOURCE, GROUP)
    }

    /// Sync state of each directory, by name
    pub fn sync_status(&self) -> [(&'static str, bool); 2] {
        [
            ("namespace-directory", self.namespaces.has_synced()),
            ("binding-directory", self.bindings.has_synced()),
        ]
    }

    /// Both directories have completed their initial sync
    pub fn is_ready(&self) -> bool {
        self.sync_status().iter().all(|(_, synced)| *synced)
    }

    pub async fn get(&self, ctx: &RequestContext, name: &str) -> RegistryResult<Project> {
        self.store.get(ctx, name).await
    }

    /// Projects visible to the caller
    ///
    /// The caller's selectors and pagination apply to the visible set only,
    /// never to the raw namespace listing.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        options: &ListOptions,
    ) -> RegistryResult<ProjectList> {
        let user = ctx.user().ok_or_else(|| {
            RegistryError::forbidden(
                &Self::qualified_resource(),
                "",
                "unable to list projects without a user on the context",
            )
        })?;

        let (labels, fields) = parse_selectors(
            options.label_selector.as_deref(),
            options.field_selector.as_deref(),
        )?;
        let project_selector = LabelSelector::parse(PROJECT_SELECTOR)?;

        let (bindings, namespaces) = futures::try_join!(
            self.bindings.list(&project_selector),
            self.namespaces.list(&project_selector),
        )?;

        let visible = resolver::resolve(user, &namespaces, &bindings);
        debug!(
            user = %user.name,
            candidates = namespaces.len(),
            bindings = bindings.len(),
            visible = visible.len(),
            "Resolved project visibility"
        );

        let predicate = ProjectPredicate::new(labels, fields);
        let selected: Vec<Project> = if predicate.is_empty() {
            visible
        } else {
            visible.into_iter().filter(|p| predicate.matches(p)).collect()
        };

        paginate(selected, options)
    }

    pub async fn watch(
        &self,
        ctx: &RequestContext,
        options: &ListOptions,
    ) -> RegistryResult<WatchStream> {
        self.store.watch(ctx, options).await
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        project: Project,
        create_validation: Option<ValidateObjectFn>,
    ) -> RegistryResult<Project> {
        self.store.create(ctx, project, create_validation).await
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        name: &str,
        project: Project,
        create_validation: Option<ValidateObjectFn>,
        update_validation: Option<ValidateObjectUpdateFn>,
        force_allow_create: bool,
    ) -> RegistryResult<(Project, bool)> {
        self.store
            .update(
                ctx,
                name,
                project,
                create_validation,
                update_validation,
                force_allow_create,
            )
            .await
    }

    pub async fn delete(
        &self,
        ctx: &RequestContext,
        name: &str,
        delete_validation: Option<ValidateObjectFn>,
        options: &DeleteOptions,
    ) -> RegistryResult<(Project, bool)> {
        self.store.delete(ctx, name, delete_validation, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::directory::{MemoryBindingDirectory, MemoryNamespaceDirectory};
    use crate::registry::resolver::{ROLE_LABEL, SUPER_ADMIN_GROUP, TYPE_LABEL};
    use crate::registry::store::MemoryProjectStore;
    use crate::registry::types::{Namespace, RoleBinding, Subject};
    use async_trait::async_trait;
    use sotaria_common::auth::UserInfo;
    use sotaria_common::ObjectMeta;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn project_ns(name: &str, role: &str) -> Namespace {
        Namespace::new(name)
            .with_label(TYPE_LABEL, "project")
            .with_label(ROLE_LABEL, role)
    }

    fn project_binding(name: &str, role: &str) -> RoleBinding {
        RoleBinding::new(name, role).with_label(TYPE_LABEL, "project")
    }

    fn registry(namespaces: Vec<Namespace>, bindings: Vec<RoleBinding>) -> ProjectRegistry {
        ProjectRegistry::new(
            Arc::new(MemoryProjectStore::new()),
            Arc::new(MemoryNamespaceDirectory::with_namespaces(namespaces)),
            Arc::new(MemoryBindingDirectory::with_bindings(bindings)),
        )
    }

    fn names(list: &ProjectList) -> Vec<&str> {
        list.items.iter().map(Project::name).collect()
    }

    fn alice() -> RequestContext {
        RequestContext::with_user(UserInfo::new("alice", ["dev"]))
    }

    #[tokio::test]
    async fn test_list_group_as_role() {
        let reg = registry(vec![project_ns("proj-a", "dev"), project_ns("proj-b", "ops")], vec![]);
        let list = reg.list(&alice(), &ListOptions::default()).await.unwrap();
        assert_eq!(names(&list), vec!["proj-a"]);
        assert_eq!(list.kind, "ProjectList");
        assert!(list.metadata.continue_token.is_none());
    }

    #[tokio::test]
    async fn test_list_binding_grants_role() {
        let reg = registry(
            vec![project_ns("proj-a", "dev"), project_ns("proj-b", "ops")],
            vec![project_binding("ops-for-dev", "ops").with_subject(Subject::group("dev"))],
        );
        let list = reg.list(&alice(), &ListOptions::default()).await.unwrap();
        assert_eq!(names(&list), vec!["proj-a", "proj-b"]);
    }

    #[tokio::test]
    async fn test_list_ignores_unlabeled_bindings_and_namespaces() {
        let reg = registry(
            vec![
                project_ns("proj-a", "dev"),
                Namespace::new("kube-system").with_label(ROLE_LABEL, "dev"),
            ],
            vec![RoleBinding::new("not-a-project-binding", "ops").with_subject(Subject::user("alice"))],
        );
        let list = reg.list(&alice(), &ListOptions::default()).await.unwrap();
        assert_eq!(names(&list), vec!["proj-a"]);
    }

    #[tokio::test]
    async fn test_list_super_admin() {
        let reg = registry(
            vec![project_ns("proj-a", "dev"), project_ns("proj-b", "ops")],
            vec![],
        );
        let root = RequestContext::with_user(UserInfo::new("root", [SUPER_ADMIN_GROUP]));
        let list = reg.list(&root, &ListOptions::default()).await.unwrap();
        assert_eq!(names(&list), vec!["proj-a", "proj-b"]);
    }

    #[tokio::test]
    async fn test_list_without_user_is_forbidden() {
        let reg = registry(vec![project_ns("proj-a", "dev")], vec![]);
        let err = reg
            .list(&RequestContext::anonymous(), &ListOptions::default())
            .await
            .unwrap_err();

        match err {
            RegistryError::Forbidden { resource, .. } => {
                assert_eq!(resource, "projects.sotaria.io")
            }
            other => panic!("expected forbidden, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authenticated_user_may_see_nothing() {
        let reg = registry(vec![project_ns("proj-a", "dev")], vec![]);
        let ctx = RequestContext::with_user(UserInfo::new("mallory", ["guests"]));
        let list = reg.list(&ctx, &ListOptions::default()).await.unwrap();
        assert!(list.items.is_empty());
    }

    struct FailingNamespaces {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NamespaceDirectory for FailingNamespaces {
        async fn list(&self, _selector: &LabelSelector) -> RegistryResult<Vec<Namespace>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RegistryError::Directory {
                directory: "namespace",
                message: "cache unavailable".to_string(),
            })
        }

        fn has_synced(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_directory_errors_propagate() {
        let failing = Arc::new(FailingNamespaces {
            calls: AtomicUsize::new(0),
        });
        let reg = ProjectRegistry::new(
            Arc::new(MemoryProjectStore::new()),
            failing.clone(),
            Arc::new(MemoryBindingDirectory::new()),
        );

        let err = reg.list(&alice(), &ListOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Directory {
                directory: "namespace",
                ..
            }
        ));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);

        let again = reg.list(&alice(), &ListOptions::default()).await.unwrap_err();
        assert!(matches!(again, RegistryError::Directory { .. }));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
        assert!(!reg.is_ready());
    }

    #[tokio::test]
    async fn test_caller_selectors_narrow_visible_set() {
        let reg = registry(
            vec![
                project_ns("proj-a", "dev").with_label("env", "prod"),
                project_ns("proj-b", "dev").with_label("env", "test"),
                project_ns("proj-c", "ops").with_label("env", "prod"),
            ],
            vec![],
        );

        let by_label = ListOptions {
            label_selector: Some("env=prod".to_string()),
            ..Default::default()
        };
        let list = reg.list(&alice(), &by_label).await.unwrap();
        assert_eq!(names(&list), vec!["proj-a"]);

        let by_name = ListOptions {
            field_selector: Some("metadata.name=proj-c".to_string()),
            ..Default::default()
        };
        let list = reg.list(&alice(), &by_name).await.unwrap();
        assert!(list.items.is_empty());

        let bad = ListOptions {
            label_selector: Some("env in (prod".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            reg.list(&alice(), &bad).await,
            Err(RegistryError::InvalidSelector(_))
        ));
    }

    #[tokio::test]
    async fn test_pagination_after_filtering() {
        let mut namespaces = Vec::new();
        for i in 0..5 {
            namespaces.push(project_ns(&format!("dev-{}", i), "dev"));
            namespaces.push(project_ns(&format!("ops-{}", i), "ops"));
        }
        let reg = registry(namespaces, vec![]);

        let mut options = ListOptions {
            limit: Some(2),
            ..Default::default()
        };
        let mut seen = Vec::new();
        loop {
            let page = reg.list(&alice(), &options).await.unwrap();
            assert!(page.items.len() <= 2);
            seen.extend(page.items.iter().map(|p| p.name().to_string()));
            match page.metadata.continue_token {
                Some(token) => {
                    assert!(page.metadata.remaining_item_count.unwrap() > 0);
                    options.continue_token = Some(token);
                }
                None => break,
            }
        }

        assert_eq!(seen, vec!["dev-0", "dev-1", "dev-2", "dev-3", "dev-4"]);
    }

    #[tokio::test]
    async fn test_invalid_continue_token() {
        let reg = registry(vec![project_ns("proj-a", "dev")], vec![]);
        let options = ListOptions {
            continue_token: Some("not base64 !!".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            reg.list(&alice(), &options).await,
            Err(RegistryError::BadRequest(_))
        ));
    }

    #[test]
    fn test_continue_token_round_trip() {
        let token = encode_continue(7, 42).unwrap();
        assert_eq!(decode_continue(&token, 42).unwrap(), 7);
        assert!(matches!(
            decode_continue(&token, 43),
            Err(RegistryError::BadRequest(_))
        ));
        assert!(decode_continue("e30", 42).is_err());
    }

    #[tokio::test]
    async fn test_continue_token_bound_to_selectors() {
        let reg = registry(
            vec![
                project_ns("proj-a", "dev"),
                project_ns("proj-b", "dev"),
                project_ns("proj-c", "dev"),
            ],
            vec![],
        );

        let first = ListOptions {
            limit: Some(1),
            label_selector: Some("env!=prod".to_string()),
            ..Default::default()
        };
        let page = reg.list(&alice(), &first).await.unwrap();
        let token = page.metadata.continue_token.unwrap();

        let same = ListOptions {
            continue_token: Some(token.clone()),
            ..first.clone()
        };
        let next = reg.list(&alice(), &same).await.unwrap();
        assert_eq!(names(&next), vec!["proj-b"]);

        let changed = ListOptions {
            label_selector: None,
            continue_token: Some(token),
            ..first
        };
        assert!(matches!(
            reg.list(&alice(), &changed).await,
            Err(RegistryError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_other_verbs_pass_through() {
        let reg = registry(vec![], vec![]);
        let ctx = RequestContext::anonymous();

        let created = reg
            .create(
                &ctx,
                Project {
                    metadata: ObjectMeta {
                        name: "proj-a".to_string(),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let fetched = reg.get(&ctx, "proj-a").await.unwrap();
        assert_eq!(fetched, created);

        // Stored projects are not listed; List only reflects the directories
        let list = reg.list(&alice(), &ListOptions::default()).await.unwrap();
        assert!(list.items.is_empty());

        let (deleted, _) = reg
            .delete(&ctx, "proj-a", None, &DeleteOptions::default())
            .await
            .unwrap();
        assert_eq!(deleted.name(), "proj-a");
        assert!(reg.get(&ctx, "proj-a").await.unwrap_err().is_not_found());
    }
}
