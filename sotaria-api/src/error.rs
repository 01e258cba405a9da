//! API error responses
//!
//! Errors are rendered as Kubernetes `Status` objects so that kubectl and
//! client libraries talking through the aggregation layer can decode them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Failure body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub kind: String,

    pub api_version: String,

    /// Always "Failure"
    pub status: String,

    /// Human-readable error message
    pub message: String,

    /// Machine-readable reason, e.g. "NotFound"
    pub reason: String,

    /// HTTP status code
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: "Status".to_string(),
            api_version: "v1".to_string(),
            status: "Failure".to_string(),
            message: message.into(),
            reason: reason.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// API error types with standardized responses
#[derive(Debug)]
pub enum ApiError {
    /// 500 Internal Server Error
    Internal(String),

    /// 404 Not Found
    NotFound(String),

    /// 403 Forbidden
    Forbidden(String),

    /// 400 Bad Request
    BadRequest(String),

    /// 409 Conflict, object already exists
    AlreadyExists(String),

    /// 409 Conflict
    Conflict(String),

    /// 422 Unprocessable Entity
    ValidationError(String),

    /// 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            ApiError::Internal(msg) => {
                error!("Internal API error: {}", msg);
                ErrorResponse::new(500, "InternalError", "An internal server error occurred")
                    .with_details(msg)
            }
            ApiError::NotFound(msg) => ErrorResponse::new(404, "NotFound", msg),
            ApiError::Forbidden(msg) => ErrorResponse::new(403, "Forbidden", msg),
            ApiError::BadRequest(msg) => ErrorResponse::new(400, "BadRequest", msg),
            ApiError::AlreadyExists(msg) => ErrorResponse::new(409, "AlreadyExists", msg),
            ApiError::Conflict(msg) => ErrorResponse::new(409, "Conflict", msg),
            ApiError::ValidationError(msg) => ErrorResponse::new(422, "Invalid", msg),
            ApiError::ServiceUnavailable(msg) => {
                ErrorResponse::new(503, "ServiceUnavailable", msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_response = self.to_error_response();
        let status_code = StatusCode::from_u16(error_response.code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status_code, Json(error_response)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_creation() {
        let error = ErrorResponse::new(404, "NotFound", "projects.sotaria.io \"a\" not found");
        assert_eq!(error.code, 404);
        assert_eq!(error.kind, "Status");
        assert_eq!(error.status, "Failure");
        assert!(error.details.is_none());
    }

    #[test]
    fn test_internal_error_hides_message() {
        let response = ApiError::Internal("lock poisoned".to_string()).to_error_response();
        assert_eq!(response.code, 500);
        assert_eq!(response.message, "An internal server error occurred");
        assert_eq!(response.details.as_deref(), Some("lock poisoned"));
    }

    #[test]
    fn test_json_error_is_bad_request() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let response = ApiError::from(err).to_error_response();
        assert_eq!(response.code, 400);
        assert!(response.message.starts_with("Invalid JSON"));
    }

    #[test]
    fn test_json_serialization() {
        let error = ErrorResponse::new(409, "AlreadyExists", "exists");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["apiVersion"], "v1");
        assert_eq!(json["reason"], "AlreadyExists");
        assert!(json.get("details").is_none());
    }
}
