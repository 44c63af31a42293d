//! Error types for the HTTP API.
//!
//! Flow failures that end a plan are rendered as an `ak-stage-flow-error`
//! challenge, so the client keeps speaking the challenge protocol. Every
//! other failure uses the [`ErrorResponse`] body.

use std::collections::BTreeMap;

use ak_flows::{Challenge, FlowError};
use ak_model::ValidationError;
use ak_storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{entity_type} not found: {slug}")]
    NotFound {
        /// Type of entity.
        entity_type: &'static str,
        /// Slug that was looked up.
        slug: String,
    },

    /// A definition was rejected.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Bad request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Flow execution failed.
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(entity_type: &'static str, slug: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            slug: slug.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Flow(error) => flow_status(error),
            Self::Storage(error) => storage_status(error),
        }
    }

    /// Returns the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_error",
            Self::BadRequest(_) => "bad_request",
            Self::Flow(error) => error.error_code(),
            Self::Storage(error) => storage_code(error),
        }
    }

    fn description(&self) -> String {
        match self {
            Self::Flow(error) => error.public_message(),
            Self::Storage(error) if error.is_not_found() || error.is_invalid_data() => {
                error.to_string()
            }
            Self::Storage(_) => "Internal error.".to_string(),
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<BTreeMap<String, Vec<String>>> {
        match self {
            Self::Validation(error) => {
                let mut details = BTreeMap::new();
                details.insert(error.field.clone(), vec![error.message.clone()]);
                Some(details)
            }
            _ => None,
        }
    }
}

const fn flow_status(error: &FlowError) -> StatusCode {
    match error {
        FlowError::FlowNotFound(_) => StatusCode::NOT_FOUND,
        FlowError::Storage(error) => storage_status(error),
        FlowError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

const fn storage_status(error: &StorageError) -> StatusCode {
    match error {
        StorageError::NotFound { .. } => StatusCode::NOT_FOUND,
        StorageError::InvalidData(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

const fn storage_code(error: &StorageError) -> &'static str {
    match error {
        StorageError::NotFound { .. } => "not_found",
        StorageError::InvalidData(_) => "validation_error",
        _ => "storage_error",
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,
    /// Human-readable error description.
    pub error_description: String,
    /// Per-field messages, for rejected definitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        if let Self::Flow(error) = &self {
            if error.is_terminal() {
                let challenge = Challenge::flow_error(error.public_message());
                return (status, Json(challenge)).into_response();
            }
        }

        let body = ErrorResponse {
            error: self.error_code().to_string(),
            error_description: self.description(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}
