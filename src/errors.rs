use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned on every failure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Bad Gateway").
    pub error: String,
    /// Human-readable description.
    pub message: String,
    /// Raw upstream diagnostics, when a platform call caused the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when the error occurred.
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient stock: {message}")]
    InsufficientStock {
        message: String,
        detail: Option<Value>,
    },

    #[error("Platform error in {method}: {message}")]
    ExternalApiError {
        method: String,
        code: Option<String>,
        message: String,
        detail: Option<Value>,
    },

    /// The issue document was confirmed but the receipt failed, and the
    /// compensating reversal failed too: stock is off the books on the
    /// platform until an operator intervenes.
    #[error(
        "Stock partially applied: issue document {issue_document_id} is confirmed \
         ({moved_units} unit(s) issued) but the receipt failed and could not be reversed"
    )]
    PartiallyApplied {
        issue_document_id: i64,
        moved_units: u32,
        detail: Option<Value>,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Whether an upstream rejection means "this account does not expose the
    /// method" — used by the startup capability probe.
    pub fn is_unknown_method(&self) -> bool {
        match self {
            Self::ExternalApiError { code, message, .. } => {
                code.as_deref() == Some("ERROR_UNKNOWN_METHOD")
                    || message.to_ascii_lowercase().contains("unknown method")
            }
            _ => false,
        }
    }

    /// Single source of truth for the error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidInput(_) | Self::InsufficientStock { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ExternalApiError { .. } | Self::PartiallyApplied { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::SerializationError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Upstream diagnostics to attach to the response body, when available.
    pub fn detail(&self) -> Option<Value> {
        match self {
            Self::ExternalApiError { detail, .. }
            | Self::InsufficientStock { detail, .. }
            | Self::PartiallyApplied { detail, .. } => detail.clone(),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.to_string(),
            details: self.detail(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}
