//! Project storage
//!
//! `ProjectStore` is the single-object storage contract the registry
//! delegates to for every verb except List. `MemoryProjectStore` is the
//! in-process implementation used by the standalone server and the tests.

use super::error::{RegistryError, RegistryResult};
use super::selector::parse_selectors;
use super::strategy::{ProjectPredicate, ProjectStrategy};
use super::types::{DeleteOptions, ListOptions, RequestContext, WatchEvent, WatchEventType};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sotaria_common::{Project, API_VERSION, PROJECTS_RESOURCE};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;

/// Validation callback run against the object about to be created or deleted
pub type ValidateObjectFn = Arc<dyn Fn(&Project) -> RegistryResult<()> + Send + Sync>;

/// Validation callback run against (new, old) during an update
pub type ValidateObjectUpdateFn =
    Arc<dyn Fn(&Project, &Project) -> RegistryResult<()> + Send + Sync>;

/// Stream of watch events
pub type WatchStream = BoxStream<'static, WatchEvent>;

const WATCH_CHANNEL_CAPACITY: usize = 256;

/// Events kept for watches resumed from a resource version
const DEFAULT_HISTORY_CAPACITY: usize = 1024;

/// Single-object project storage
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get(&self, ctx: &RequestContext, name: &str) -> RegistryResult<Project>;

    async fn create(
        &self,
        ctx: &RequestContext,
        project: Project,
        create_validation: Option<ValidateObjectFn>,
    ) -> RegistryResult<Project>;

    /// Returns the stored object and whether the update created it
    async fn update(
        &self,
        ctx: &RequestContext,
        name: &str,
        project: Project,
        create_validation: Option<ValidateObjectFn>,
        update_validation: Option<ValidateObjectUpdateFn>,
        force_allow_create: bool,
    ) -> RegistryResult<(Project, bool)>;

    /// Returns the deleted object and whether deletion completed immediately
    async fn delete(
        &self,
        ctx: &RequestContext,
        name: &str,
        delete_validation: Option<ValidateObjectFn>,
        options: &DeleteOptions,
    ) -> RegistryResult<(Project, bool)>;

    async fn watch(&self, ctx: &RequestContext, options: &ListOptions)
        -> RegistryResult<WatchStream>;
}

#[derive(Debug, Clone)]
struct StoredEvent {
    resource_version: u64,
    event_type: WatchEventType,
    project: Project,
}

struct StoreState {
    objects: BTreeMap<String, Project>,
    resource_version: u64,
    history: VecDeque<StoredEvent>,
    history_capacity: usize,
    /// Highest resource version no longer in `history`
    compacted: u64,
}

impl StoreState {
    fn new(history_capacity: usize) -> Self {
        Self {
            objects: BTreeMap::new(),
            resource_version: 0,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
            compacted: 0,
        }
    }

    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn record(&mut self, event: StoredEvent) {
        self.history.push_back(event);
        while self.history.len() > self.history_capacity {
            if let Some(evicted) = self.history.pop_front() {
                self.compacted = evicted.resource_version;
            }
        }
    }
}

fn parse_resource_version(rv: &str) -> RegistryResult<u64> {
    rv.parse()
        .map_err(|_| RegistryError::BadRequest(format!("invalid resource version \"{}\"", rv)))
}

/// In-memory project store with resource versions and watch support
pub struct MemoryProjectStore {
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoredEvent>,
    strategy: ProjectStrategy,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY_CAPACITY)
    }

    /// Store that keeps the last `capacity` events for resumed watches
    pub fn with_history(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(StoreState::new(capacity)),
            events,
            strategy: ProjectStrategy,
        }
    }

    /// Record and broadcast an event. Caller holds the write lock.
    fn publish(&self, state: &mut StoreState, event_type: WatchEventType, project: &Project) {
        let event = StoredEvent {
            resource_version: state.resource_version,
            event_type,
            project: project.clone(),
        };
        state.record(event.clone());
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Stamp a new object and insert it. Caller holds the write lock.
    fn insert_new(&self, state: &mut StoreState, mut project: Project) -> Project {
        project.api_version = API_VERSION.to_string();
        project.kind = "Project".to_string();
        project.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        project.metadata.creation_timestamp = Some(chrono::Utc::now());
        project.metadata.resource_version = Some(state.next_resource_version());

        state
            .objects
            .insert(project.metadata.name.clone(), project.clone());
        self.publish(state, WatchEventType::Added, &project);
        tracing::debug!(project = %project.metadata.name, "Created project");
        project
    }
}

impl Default for MemoryProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn get(&self, _ctx: &RequestContext, name: &str) -> RegistryResult<Project> {
        let state = self.state.read().await;
        state
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(PROJECTS_RESOURCE, name))
    }

    async fn create(
        &self,
        _ctx: &RequestContext,
        mut project: Project,
        create_validation: Option<ValidateObjectFn>,
    ) -> RegistryResult<Project> {
        self.strategy.prepare_for_create(&mut project);
        self.strategy.validate(&project)?;
        if let Some(validate) = &create_validation {
            validate(&project)?;
        }

        let mut state = self.state.write().await;
        if state.objects.contains_key(project.name()) {
            return Err(RegistryError::AlreadyExists {
                resource: PROJECTS_RESOURCE.to_string(),
                name: project.metadata.name.clone(),
            });
        }

        Ok(self.insert_new(&mut state, project))
    }

    async fn update(
        &self,
        _ctx: &RequestContext,
        name: &str,
        mut project: Project,
        create_validation: Option<ValidateObjectFn>,
        update_validation: Option<ValidateObjectUpdateFn>,
        force_allow_create: bool,
    ) -> RegistryResult<(Project, bool)> {
        if project.metadata.name.is_empty() {
            project.metadata.name = name.to_string();
        }
        if project.metadata.name != name {
            return Err(RegistryError::BadRequest(format!(
                "the name of the object ({}) does not match the name on the URL ({})",
                project.metadata.name, name
            )));
        }

        let mut state = self.state.write().await;
        let current = state.objects.get(name).cloned();
        let existing = match current {
            Some(existing) => existing,
            None => {
                if !(self.strategy.allow_create_on_update() || force_allow_create) {
                    return Err(RegistryError::not_found(PROJECTS_RESOURCE, name));
                }
                self.strategy.validate(&project)?;
                if let Some(validate) = &create_validation {
                    validate(&project)?;
                }
                return Ok((self.insert_new(&mut state, project), true));
            }
        };

        match project.metadata.resource_version.as_deref() {
            None | Some("") if !self.strategy.allow_unconditional_update() => {
                return Err(RegistryError::invalid(
                    PROJECTS_RESOURCE,
                    name,
                    vec!["metadata.resourceVersion: Invalid value: 0x0: must be specified for an update"
                        .to_string()],
                ));
            }
            Some(rv) if !rv.is_empty() && Some(rv) != existing.metadata.resource_version.as_deref() => {
                return Err(RegistryError::conflict(
                    PROJECTS_RESOURCE,
                    name,
                    "the object has been modified; please apply your changes to the latest version and try again",
                ));
            }
            _ => {}
        }

        self.strategy.validate_update(&project, &existing)?;
        if let Some(validate) = &update_validation {
            validate(&project, &existing)?;
        }

        project.api_version = API_VERSION.to_string();
        project.kind = "Project".to_string();
        project.metadata.uid = existing.metadata.uid.clone();
        project.metadata.creation_timestamp = existing.metadata.creation_timestamp;
        project.metadata.resource_version = Some(state.next_resource_version());

        state.objects.insert(name.to_string(), project.clone());
        self.publish(&mut state, WatchEventType::Modified, &project);
        tracing::debug!(project = %name, "Updated project");

        Ok((project, false))
    }

    async fn delete(
        &self,
        _ctx: &RequestContext,
        name: &str,
        delete_validation: Option<ValidateObjectFn>,
        options: &DeleteOptions,
    ) -> RegistryResult<(Project, bool)> {
        let mut state = self.state.write().await;
        let existing = state
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(PROJECTS_RESOURCE, name))?;

        if let Some(preconditions) = &options.preconditions {
            if let Some(uid) = &preconditions.uid {
                if existing.metadata.uid.as_ref() != Some(uid) {
                    return Err(RegistryError::conflict(
                        PROJECTS_RESOURCE,
                        name,
                        format!(
                            "Precondition failed: UID in precondition: {}, UID in object meta: {}",
                            uid,
                            existing.metadata.uid.as_deref().unwrap_or_default()
                        ),
                    ));
                }
            }
            if let Some(rv) = &preconditions.resource_version {
                if existing.metadata.resource_version.as_ref() != Some(rv) {
                    return Err(RegistryError::conflict(
                        PROJECTS_RESOURCE,
                        name,
                        format!(
                            "Precondition failed: ResourceVersion in precondition: {}, ResourceVersion in object meta: {}",
                            rv,
                            existing.metadata.resource_version.as_deref().unwrap_or_default()
                        ),
                    ));
                }
            }
        }

        if let Some(validate) = &delete_validation {
            validate(&existing)?;
        }

        state.objects.remove(name);
        let mut deleted = existing;
        deleted.metadata.resource_version = Some(state.next_resource_version());
        self.publish(&mut state, WatchEventType::Deleted, &deleted);
        tracing::debug!(project = %name, "Deleted project");

        Ok((deleted, true))
    }

    async fn watch(
        &self,
        _ctx: &RequestContext,
        options: &ListOptions,
    ) -> RegistryResult<WatchStream> {
        let (labels, fields) = parse_selectors(
            options.label_selector.as_deref(),
            options.field_selector.as_deref(),
        )?;
        let predicate = ProjectPredicate::new(labels, fields);

        let since = match options.resource_version.as_deref() {
            None | Some("") | Some("0") => None,
            Some(rv) => Some(parse_resource_version(rv)?),
        };

        // Subscribe under the lock so no event falls between replay and live
        let state = self.state.read().await;
        let rx = self.events.subscribe();
        let replay: Vec<WatchEvent> = match since {
            None => state
                .objects
                .values()
                .filter(|p| predicate.matches(p))
                .map(|p| WatchEvent::project(WatchEventType::Added, p))
                .collect(),
            Some(rv) if rv < state.compacted => {
                let message = format!("too old resource version: {} ({})", rv, state.compacted + 1);
                tracing::debug!(requested = rv, oldest = state.compacted + 1, "Project watch expired");
                return Ok(stream::iter(vec![WatchEvent::error(message)]).boxed());
            }
            Some(rv) => state
                .history
                .iter()
                .filter(|e| e.resource_version > rv && predicate.matches(&e.project))
                .map(|e| WatchEvent::project(e.event_type, &e.project))
                .collect(),
        };
        drop(state);

        let live = stream::unfold(Some((rx, predicate)), |cursor| async move {
            let (mut rx, predicate) = match cursor {
                Some(cursor) => cursor,
                None => return None,
            };
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if predicate.matches(&event.project) {
                            let out = WatchEvent::project(event.event_type, &event.project);
                            return Some((out, Some((rx, predicate))));
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Project watcher fell behind, closing stream");
                        let out = WatchEvent::error(format!(
                            "watch fell behind by {} events; restart the watch",
                            skipped
                        ));
                        return Some((out, None));
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream::iter(replay).chain(live).boxed())
    }
}
