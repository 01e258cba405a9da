//! Project registry
//!
//! Visibility resolution over namespace and binding directories, the
//! project store, and the proxy that combines them.

pub mod directory;
pub mod error;
#[cfg(feature = "kubernetes")]
pub mod kubernetes;
pub mod project;
pub mod resolver;
pub mod selector;
pub mod store;
pub mod strategy;
pub mod types;

pub use directory::{
    BindingDirectory, MemoryBindingDirectory, MemoryNamespaceDirectory, NamespaceDirectory,
};
pub use error::{RegistryError, RegistryResult};
pub use project::ProjectRegistry;
pub use resolver::{resolve, PROJECT_SELECTOR, ROLE_LABEL, SUPER_ADMIN_GROUP, TYPE_LABEL};
pub use selector::{FieldSelector, LabelSelector};
pub use store::{MemoryProjectStore, ProjectStore, WatchStream};
pub use strategy::{ProjectPredicate, ProjectStrategy};
pub use types::{
    DeleteOptions, ListOptions, Namespace, Preconditions, RequestContext, RoleBinding, Subject,
    SubjectKind, WatchEvent, WatchEventType,
};
