//! Flow execution error types.
//!
//! Errors fall into three groups:
//!
//! - terminal errors, which abort the plan ([`FlowError::is_terminal`])
//! - client errors, which reject a single request and leave the plan untouched
//! - infrastructure errors (storage, serialization)

use ak_storage::StorageError;
use thiserror::Error;

/// Errors raised while planning or executing a flow.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A stage cannot continue. Aborts the flow.
    #[error("stage invalid: {0}")]
    StageInvalid(String),

    /// A referenced flow does not exist.
    #[error("flow not found: {0}")]
    FlowNotFound(String),

    /// The flow's own policies deny this request.
    #[error("flow '{slug}' does not apply to the current request")]
    FlowNonApplicable {
        /// Flow slug.
        slug: String,
        /// Messages returned by the policies.
        messages: Vec<String>,
    },

    /// Planning produced no stages.
    #[error("flow '{0}' has no applicable stages")]
    EmptyFlow(String),

    /// No implementation is registered for a stage type.
    #[error("no stage implementation registered for type '{0}'")]
    UnknownStageType(String),

    /// A response was submitted for a different component than the one challenged.
    #[error("response component '{received}' does not match challenge component '{expected}'")]
    ComponentMismatch {
        /// Component of the current stage.
        expected: String,
        /// Component of the submitted response.
        received: String,
    },

    /// The submitted response could not be decoded.
    #[error("invalid challenge response: {0}")]
    InvalidResponse(String),

    /// A stage exceeded its retry ceiling.
    #[error("stage '{stage}' failed {attempts} times")]
    RetryLimitExceeded {
        /// Stage name.
        stage: String,
        /// Failed attempts recorded.
        attempts: u32,
    },

    /// Policy evaluation failed.
    #[error("policy evaluation failed: {0}")]
    Policy(String),

    /// Plan store or flow lookup failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Plan (de)serialization failed.
    #[error("plan serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// Creates a stage invalid error.
    #[must_use]
    pub fn stage_invalid(message: impl Into<String>) -> Self {
        Self::StageInvalid(message.into())
    }

    /// Returns whether this error ends the flow.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::StageInvalid(_)
                | Self::FlowNotFound(_)
                | Self::FlowNonApplicable { .. }
                | Self::EmptyFlow(_)
                | Self::UnknownStageType(_)
                | Self::RetryLimitExceeded { .. }
                | Self::Policy(_)
        )
    }

    /// Returns whether this error was caused by the submitted request.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ComponentMismatch { .. } | Self::InvalidResponse(_)
        )
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::StageInvalid(_) => "stage_invalid",
            Self::FlowNotFound(_) => "flow_not_found",
            Self::FlowNonApplicable { .. } => "flow_non_applicable",
            Self::EmptyFlow(_) => "empty_flow",
            Self::UnknownStageType(_) => "unknown_stage_type",
            Self::ComponentMismatch { .. } => "component_mismatch",
            Self::InvalidResponse(_) => "invalid_response",
            Self::RetryLimitExceeded { .. } => "retry_limit_exceeded",
            Self::Policy(_) => "policy_error",
            Self::Storage(_) => "storage_error",
            Self::Serialization(_) => "serialization_error",
        }
    }

    /// Message safe to show to the end user.
    ///
    /// Terminal stage failures are reported generically; the specific
    /// reason is only logged.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::StageInvalid(_) | Self::UnknownStageType(_) | Self::Policy(_) => {
                "This flow could not be completed.".to_string()
            }
            Self::FlowNotFound(_) => "Flow does not exist.".to_string(),
            Self::FlowNonApplicable { .. } | Self::EmptyFlow(_) => {
                "Flow does not apply to current user.".to_string()
            }
            Self::RetryLimitExceeded { .. } => "Too many failed attempts.".to_string(),
            Self::ComponentMismatch { .. } | Self::InvalidResponse(_) => self.to_string(),
            Self::Storage(_) | Self::Serialization(_) => "Internal error.".to_string(),
        }
    }
}

/// Result type for flow operations.
pub type FlowResult<T> = Result<T, FlowError>;
