//! Project visibility resolution
//!
//! Decides which namespaces a caller may see as projects. A namespace is
//! visible when its role label names:
//! - a group the caller belongs to, or
//! - a role granted to the caller by a project binding (as a user, a
//!   service account, or through one of the caller's groups),
//!
//! or when the caller is in the super-admin group.

use super::types::{Namespace, RoleBinding, Subject, SubjectKind};
use sotaria_common::auth::UserInfo;
use sotaria_common::Project;
use std::collections::HashSet;

/// Label carrying the role that owns a namespace
pub const ROLE_LABEL: &str = "security.sotaria.io/role";

/// Label marking namespaces and bindings that belong to the project model
pub const TYPE_LABEL: &str = "security.sotaria.io/type";

/// Selector for project namespaces and project bindings
pub const PROJECT_SELECTOR: &str = "security.sotaria.io/type=project";

/// Members of this group see every project.
// TODO: replace with a configurable set of trusted groups once the
// deployment manifests carry a policy section.
pub const SUPER_ADMIN_GROUP: &str = "system:masters";

const SERVICE_ACCOUNT_PREFIX: &str = "system:serviceaccount:";

/// Whether a binding subject refers to the caller
pub fn subject_matches(subject: &Subject, user: &UserInfo) -> bool {
    match subject.kind {
        SubjectKind::User => subject.name == user.name,
        SubjectKind::Group => user.in_group(&subject.name),
        SubjectKind::ServiceAccount => {
            if subject.name == user.name {
                return true;
            }
            match &subject.namespace {
                Some(ns) => {
                    user.name
                        == format!("{}{}:{}", SERVICE_ACCOUNT_PREFIX, ns, subject.name)
                }
                None => false,
            }
        }
        SubjectKind::Unknown => false,
    }
}

/// Roles granted to the caller by any of the bindings
pub fn granted_roles<'a>(user: &UserInfo, bindings: &'a [RoleBinding]) -> HashSet<&'a str> {
    bindings
        .iter()
        .filter(|b| b.subjects.iter().any(|s| subject_matches(s, user)))
        .map(|b| b.role_name.as_str())
        .collect()
}

pub fn is_super_admin(user: &UserInfo) -> bool {
    user.in_group(SUPER_ADMIN_GROUP)
}

fn is_visible(namespace: &Namespace, user: &UserInfo, granted: &HashSet<&str>, admin: bool) -> bool {
    if admin {
        return true;
    }
    match namespace.label(ROLE_LABEL) {
        Some(role) if !role.is_empty() => user.in_group(role) || granted.contains(role),
        _ => false,
    }
}

/// Project views of the namespaces the caller may see, in directory order
pub fn resolve(user: &UserInfo, namespaces: &[Namespace], bindings: &[RoleBinding]) -> Vec<Project> {
    let granted = granted_roles(user, bindings);
    let admin = is_super_admin(user);

    namespaces
        .iter()
        .filter(|ns| is_visible(ns, user, &granted, admin))
        .map(Namespace::to_project)
        .collect()
}
