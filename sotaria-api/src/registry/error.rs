//! Registry error types and ApiError mapping
//!
//! The registry never recovers from these locally. Directory and store
//! failures reach the caller unchanged.

use crate::error::ApiError;
use thiserror::Error;

/// Registry-layer errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Caller is not allowed to perform the operation
    #[error("{} is forbidden: {reason}", qualified(resource, name))]
    Forbidden {
        resource: String,
        name: String,
        reason: String,
    },

    /// Label or field selector failed to parse
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Namespace or binding directory could not be queried
    #[error("{directory} directory error: {message}")]
    Directory {
        directory: &'static str,
        message: String,
    },

    #[error("{resource} \"{name}\" not found")]
    NotFound { resource: String, name: String },

    #[error("{resource} \"{name}\" already exists")]
    AlreadyExists { resource: String, name: String },

    /// Optimistic concurrency or precondition failure
    #[error("Operation cannot be fulfilled on {resource} \"{name}\": {reason}")]
    Conflict {
        resource: String,
        name: String,
        reason: String,
    },

    /// Object failed validation
    #[error("{resource} \"{name}\" is invalid: {}", causes.join(", "))]
    Invalid {
        resource: String,
        name: String,
        causes: Vec<String>,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Error from kube-rs client
    #[cfg(feature = "kubernetes")]
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    pub fn forbidden(resource: &str, name: &str, reason: impl Into<String>) -> Self {
        RegistryError::Forbidden {
            resource: resource.to_string(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: &str, name: &str) -> Self {
        RegistryError::NotFound {
            resource: resource.to_string(),
            name: name.to_string(),
        }
    }

    pub fn conflict(resource: &str, name: &str, reason: impl Into<String>) -> Self {
        RegistryError::Conflict {
            resource: resource.to_string(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(resource: &str, name: &str, causes: Vec<String>) -> Self {
        RegistryError::Invalid {
            resource: resource.to_string(),
            name: name.to_string(),
            causes,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            e @ RegistryError::Forbidden { .. } => ApiError::Forbidden(e.to_string()),
            RegistryError::InvalidSelector(msg) => ApiError::BadRequest(msg),
            e @ RegistryError::Directory { .. } => ApiError::ServiceUnavailable(e.to_string()),
            e @ RegistryError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            e @ RegistryError::AlreadyExists { .. } => ApiError::AlreadyExists(e.to_string()),
            e @ RegistryError::Conflict { .. } => ApiError::Conflict(e.to_string()),
            e @ RegistryError::Invalid { .. } => ApiError::ValidationError(e.to_string()),
            RegistryError::BadRequest(msg) => ApiError::BadRequest(msg),
            #[cfg(feature = "kubernetes")]
            RegistryError::Kube(e) => match &e {
                kube::Error::Api(response) if response.code == 403 => {
                    ApiError::Forbidden(response.message.clone())
                }
                kube::Error::Api(response) if response.code == 404 => {
                    ApiError::NotFound(response.message.clone())
                }
                _ => ApiError::ServiceUnavailable(format!("Kubernetes error: {}", e)),
            },
            RegistryError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

fn qualified(resource: &str, name: &str) -> String {
    if name.is_empty() {
        resource.to_string()
    } else {
        format!("{} \"{}\"", resource, name)
    }
}

/// Result type alias for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
