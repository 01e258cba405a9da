//! Caller identity types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Authenticated caller as handed to the apiserver by the front proxy
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl UserInfo {
    pub fn new<I, S>(name: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Check direct membership in a group
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}
