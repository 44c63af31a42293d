//! Policy bindings.
//!
//! A policy binding attaches a named policy to a flow or a stage binding.
//! The policies themselves are evaluated by an external policy engine; this
//! module only describes how they are bound.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the results of several policy bindings are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEngineMode {
    /// At least one binding must pass.
    #[default]
    Any,
    /// Every binding must pass.
    All,
}

/// A policy bound to a flow or stage binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBinding {
    /// Unique identifier.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    /// Name of the policy to evaluate.
    pub policy: String,
    /// Invert the policy result.
    #[serde(default)]
    pub negate: bool,
    /// Disabled bindings are ignored entirely.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Evaluation order.
    #[serde(default)]
    pub order: i32,
}

const fn default_enabled() -> bool {
    true
}

impl PolicyBinding {
    /// Creates an enabled, non-negated binding for the named policy.
    #[must_use]
    pub fn new(policy: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            policy: policy.into(),
            negate: false,
            enabled: true,
            order: 0,
        }
    }

    /// Inverts the policy result.
    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Disables the binding.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Sets the evaluation order.
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}
