//! Policy evaluation.
//!
//! Policies are an external collaborator: the engine only knows policy names
//! and asks a [`PolicyEngine`] whether each passes for a plan context. How
//! bindings combine (negation, disabled bindings, any/all) is decided here.

use std::collections::HashMap;

use ak_model::{PolicyBinding, PolicyEngineMode};
use async_trait::async_trait;

use crate::context::PlanContext;
use crate::error::FlowResult;

/// Result of evaluating one policy or a set of bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyResult {
    /// Whether access is granted.
    pub passing: bool,
    /// Messages to surface, if any.
    pub messages: Vec<String>,
}

impl PolicyResult {
    /// A passing result.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passing: true,
            messages: Vec::new(),
        }
    }

    /// A failing result with a message.
    #[must_use]
    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            passing: false,
            messages: vec![message.into()],
        }
    }
}

/// Evaluates named policies against a plan context.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Evaluates a single policy.
    async fn evaluate_policy(&self, policy: &str, context: &PlanContext)
        -> FlowResult<PolicyResult>;

    /// Evaluates a set of bindings.
    ///
    /// Disabled bindings are ignored and negated bindings invert their
    /// policy's result. With no enabled bindings the set passes.
    async fn evaluate(
        &self,
        bindings: &[PolicyBinding],
        mode: PolicyEngineMode,
        context: &PlanContext,
    ) -> FlowResult<PolicyResult> {
        let mut enabled: Vec<&PolicyBinding> = bindings.iter().filter(|b| b.enabled).collect();
        if enabled.is_empty() {
            return Ok(PolicyResult::pass());
        }
        enabled.sort_by_key(|b| b.order);

        let mut passed = 0usize;
        let mut messages = Vec::new();
        for binding in &enabled {
            let result = self.evaluate_policy(&binding.policy, context).await?;
            if result.passing != binding.negate {
                passed += 1;
            }
            messages.extend(result.messages);
        }

        let passing = match mode {
            PolicyEngineMode::Any => passed > 0,
            PolicyEngineMode::All => passed == enabled.len(),
        };
        Ok(PolicyResult { passing, messages })
    }
}

/// Policy engine backed by a fixed table of decisions.
///
/// Policies not in the table pass.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyEngine {
    decisions: HashMap<String, bool>,
}

impl StaticPolicyEngine {
    /// Creates an engine where every policy passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the named policy fail.
    #[must_use]
    pub fn deny(mut self, policy: impl Into<String>) -> Self {
        self.decisions.insert(policy.into(), false);
        self
    }

    /// Makes the named policy pass.
    #[must_use]
    pub fn allow(mut self, policy: impl Into<String>) -> Self {
        self.decisions.insert(policy.into(), true);
        self
    }

    /// Creates an engine denying the given policies.
    #[must_use]
    pub fn denying<I, S>(policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        policies
            .into_iter()
            .fold(Self::new(), |engine, policy| engine.deny(policy))
    }
}

#[async_trait]
impl PolicyEngine for StaticPolicyEngine {
    async fn evaluate_policy(
        &self,
        policy: &str,
        _context: &PlanContext,
    ) -> FlowResult<PolicyResult> {
        match self.decisions.get(policy) {
            Some(true) => Ok(PolicyResult::pass()),
            Some(false) => Ok(PolicyResult::deny(format!("Policy '{policy}' denied access."))),
            None => {
                tracing::warn!(policy, "Unknown policy, treating as passing");
                Ok(PolicyResult::pass())
            }
        }
    }
}
