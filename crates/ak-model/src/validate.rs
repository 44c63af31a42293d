//! Definition-time validation.
//!
//! These checks run when an administrator saves a definition. A definition
//! that fails here never reaches the executor.

use std::collections::HashSet;

use thiserror::Error;

use crate::flow::Flow;
use crate::stage::{Stage, StageKind};

/// A rejected definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Field the error applies to (`non_field_errors` for cross-field checks).
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationError {
    /// Creates an error for a specific field.
    #[must_use]
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an error that spans several fields.
    #[must_use]
    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field("non_field_errors", message)
    }
}

/// Message for a redirect stage without any target.
pub const REDIRECT_TARGET_REQUIRED: &str = "At least one redirect target should be present.";

/// Validates a stage definition.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_stage(stage: &Stage) -> Result<(), ValidationError> {
    if stage.name.trim().is_empty() {
        return Err(ValidationError::field("name", "This field may not be blank."));
    }

    match &stage.kind {
        StageKind::Redirect(redirect) => {
            if redirect.static_target().is_none() && redirect.flow_target().is_none() {
                return Err(ValidationError::non_field(REDIRECT_TARGET_REQUIRED));
            }
        }
        StageKind::Identification(identification) => {
            if identification.user_fields.is_empty() {
                return Err(ValidationError::field(
                    "user_fields",
                    "At least one user field is required.",
                ));
            }
        }
        StageKind::Deny(_) | StageKind::Dummy(_) => {}
    }

    Ok(())
}

/// Returns whether `slug` only contains letters, digits, `-` and `_`.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validates a flow definition, including every bound stage.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_flow(flow: &Flow) -> Result<(), ValidationError> {
    if !is_valid_slug(&flow.slug) {
        return Err(ValidationError::field(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        ));
    }

    let mut orders = HashSet::new();
    for binding in &flow.bindings {
        if !orders.insert(binding.order) {
            return Err(ValidationError::field(
                "bindings",
                format!("Duplicate stage binding order {}.", binding.order),
            ));
        }
        validate_stage(&binding.stage).map_err(|err| {
            ValidationError::field(
                format!("bindings.{}.{}", binding.stage.name, err.field),
                err.message,
            )
        })?;
    }

    Ok(())
}
