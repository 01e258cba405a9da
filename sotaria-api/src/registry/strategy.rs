//! Project create/update strategy
//!
//! Projects are cluster-scoped. Object validation is intentionally empty
//! beyond name checks; updates must be conditional and may not create.

use super::error::{RegistryError, RegistryResult};
use super::selector::{FieldSelector, LabelSelector};
use rand::Rng;
use sotaria_common::{Project, PROJECTS_RESOURCE};

const NAME_SUFFIX_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
const NAME_SUFFIX_LENGTH: usize = 5;
const MAX_GENERATED_PREFIX_LENGTH: usize = 253 - NAME_SUFFIX_LENGTH;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectStrategy;

impl ProjectStrategy {
    pub fn namespace_scoped(&self) -> bool {
        false
    }

    pub fn allow_create_on_update(&self) -> bool {
        false
    }

    pub fn allow_unconditional_update(&self) -> bool {
        false
    }

    /// Assign a generated name when only `generateName` was supplied
    pub fn prepare_for_create(&self, project: &mut Project) {
        if project.metadata.name.is_empty() {
            if let Some(prefix) = project.metadata.generate_name.as_deref() {
                if !prefix.is_empty() {
                    project.metadata.name = generate_name(prefix);
                }
            }
        }
    }

    pub fn validate(&self, project: &Project) -> RegistryResult<()> {
        let causes = validate_path_segment_name(&project.metadata.name);
        if causes.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::invalid(
                PROJECTS_RESOURCE,
                &project.metadata.name,
                causes,
            ))
        }
    }

    pub fn validate_update(&self, new: &Project, old: &Project) -> RegistryResult<()> {
        if new.metadata.name != old.metadata.name {
            return Err(RegistryError::invalid(
                PROJECTS_RESOURCE,
                &old.metadata.name,
                vec!["metadata.name: Invalid value: field is immutable".to_string()],
            ));
        }
        self.validate(new)
    }
}

/// Prefix plus a short random suffix
pub fn generate_name(prefix: &str) -> String {
    let prefix: String = prefix.chars().take(MAX_GENERATED_PREFIX_LENGTH).collect();

    let mut rng = rand::thread_rng();
    let suffix: String = (0..NAME_SUFFIX_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..NAME_SUFFIX_ALPHABET.len());
            NAME_SUFFIX_ALPHABET[idx] as char
        })
        .collect();

    format!("{}{}", prefix, suffix)
}

/// Names must be usable as a single URL path segment
pub fn validate_path_segment_name(name: &str) -> Vec<String> {
    let mut causes = Vec::new();
    if name.is_empty() {
        causes.push("metadata.name: Required value: name or generateName is required".to_string());
        return causes;
    }
    if name == "." || name == ".." {
        causes.push(format!("metadata.name: Invalid value: \"{}\": may not be '.' or '..'", name));
    }
    for illegal in ["/", "%"] {
        if name.contains(illegal) {
            causes.push(format!(
                "metadata.name: Invalid value: \"{}\": may not contain '{}'",
                name, illegal
            ));
        }
    }
    causes
}

/// Label and field predicate used by List and Watch
#[derive(Debug, Clone, Default)]
pub struct ProjectPredicate {
    pub labels: LabelSelector,
    pub fields: FieldSelector,
}

impl ProjectPredicate {
    pub fn new(labels: LabelSelector, fields: FieldSelector) -> Self {
        Self { labels, fields }
    }

    pub fn everything() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.fields.is_empty()
    }

    pub fn matches(&self, project: &Project) -> bool {
        self.labels.matches(&project.metadata.labels) && self.fields.matches_name(project.name())
    }
}
