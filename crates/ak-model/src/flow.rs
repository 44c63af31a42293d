//! Flow definitions.
//!
//! A flow is a named sequence of stage bindings. Flows are referenced by
//! slug at runtime and are immutable input to the planner.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::{PolicyBinding, PolicyEngineMode};
use crate::stage::Stage;

/// What a flow is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDesignation {
    /// Log a user in.
    Authentication,
    /// Authorize an application.
    Authorization,
    /// Log a user out.
    Invalidation,
    /// Create a new user.
    Enrollment,
    /// Delete a user.
    Unenrollment,
    /// Recover a lost credential.
    Recovery,
    /// Configure a stage for the current user.
    StageConfiguration,
}

/// Layout hint for the client rendering the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowLayout {
    /// Single column.
    #[default]
    Stacked,
    /// Content on the left.
    ContentLeft,
    /// Content on the right.
    ContentRight,
    /// Sidebar on the left.
    SidebarLeft,
    /// Sidebar on the right.
    SidebarRight,
}

/// A stage bound into a flow at an order position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStageBinding {
    /// Unique identifier.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    /// The bound stage.
    pub stage: Stage,
    /// Position within the flow; lower runs first.
    pub order: i32,
    /// Evaluate the policies again right before the stage runs.
    #[serde(default)]
    pub re_evaluate_policies: bool,
    /// How the binding's policies are combined.
    #[serde(default)]
    pub policy_engine_mode: PolicyEngineMode,
    /// Policies gating the stage.
    #[serde(default)]
    pub policies: Vec<PolicyBinding>,
}

impl FlowStageBinding {
    /// Binds a stage at the given order with no policies.
    #[must_use]
    pub fn new(stage: Stage, order: i32) -> Self {
        Self {
            id: Uuid::now_v7(),
            stage,
            order,
            re_evaluate_policies: false,
            policy_engine_mode: PolicyEngineMode::Any,
            policies: Vec::new(),
        }
    }

    /// Adds a policy binding.
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyBinding) -> Self {
        self.policies.push(policy);
        self
    }

    /// Sets the policy engine mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: PolicyEngineMode) -> Self {
        self.policy_engine_mode = mode;
        self
    }

    /// Re-evaluates policies right before the stage runs.
    #[must_use]
    pub const fn re_evaluate(mut self) -> Self {
        self.re_evaluate_policies = true;
        self
    }
}

/// A flow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    /// Unique identifier.
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    /// Client-facing identifier.
    pub slug: String,
    /// Internal name.
    pub name: String,
    /// Title shown to the user.
    #[serde(default)]
    pub title: String,
    /// What the flow is used for.
    pub designation: FlowDesignation,
    /// Layout hint.
    #[serde(default)]
    pub layout: FlowLayout,
    /// How the flow-level policies are combined.
    #[serde(default)]
    pub policy_engine_mode: PolicyEngineMode,
    /// Policies deciding whether the flow applies at all.
    #[serde(default)]
    pub policies: Vec<PolicyBinding>,
    /// Bound stages.
    #[serde(default)]
    pub bindings: Vec<FlowStageBinding>,
}

impl Flow {
    /// Creates an empty flow.
    #[must_use]
    pub fn new(slug: impl Into<String>, designation: FlowDesignation) -> Self {
        let slug = slug.into();
        Self {
            id: Uuid::now_v7(),
            name: slug.clone(),
            title: slug.clone(),
            slug,
            designation,
            layout: FlowLayout::Stacked,
            policy_engine_mode: PolicyEngineMode::Any,
            policies: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Adds a stage binding.
    #[must_use]
    pub fn with_binding(mut self, binding: FlowStageBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Binds a stage after the current last binding.
    #[must_use]
    pub fn with_stage(self, stage: Stage) -> Self {
        let order = self
            .bindings
            .iter()
            .map(|b| b.order)
            .max()
            .map_or(10, |max| max + 10);
        self.with_binding(FlowStageBinding::new(stage, order))
    }

    /// Adds a flow-level policy binding.
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyBinding) -> Self {
        self.policies.push(policy);
        self
    }

    /// Returns the stage bindings sorted by order.
    ///
    /// Bindings with equal order keep their definition order.
    #[must_use]
    pub fn ordered_bindings(&self) -> Vec<&FlowStageBinding> {
        let mut bindings: Vec<&FlowStageBinding> = self.bindings.iter().collect();
        bindings.sort_by_key(|b| b.order);
        bindings
    }

    /// Path of the client-facing interface for this flow.
    #[must_use]
    pub fn interface_path(&self) -> String {
        interface_path(&self.slug)
    }
}

/// Path of the client-facing interface for the flow with the given slug.
#[must_use]
pub fn interface_path(slug: &str) -> String {
    format!("/if/flow/{slug}/")
}
