//! Flow planner.
//!
//! Turns a flow definition and a context into a [`FlowPlan`]: flow-level
//! policies decide whether the flow applies at all, binding policies decide
//! which stages are scheduled.

use ak_model::Flow;

use crate::context::PlanContext;
use crate::error::{FlowError, FlowResult};
use crate::plan::{FlowPlan, PlannedStage};
use crate::policy::PolicyEngine;

/// Plans executions of one flow.
#[derive(Debug, Clone, Copy)]
pub struct FlowPlanner<'a> {
    flow: &'a Flow,
}

impl<'a> FlowPlanner<'a> {
    /// Creates a planner for a flow.
    #[must_use]
    pub const fn new(flow: &'a Flow) -> Self {
        Self { flow }
    }

    /// Computes a plan.
    ///
    /// ## Errors
    ///
    /// - `FlowError::FlowNonApplicable` if the flow's own policies fail
    /// - `FlowError::EmptyFlow` if no stage passes its policies
    pub async fn plan(
        &self,
        policies: &dyn PolicyEngine,
        context: PlanContext,
    ) -> FlowResult<FlowPlan> {
        self.check_applicable(policies, &context).await?;
        let stages = self.plan_stages(policies, &context).await?;
        if stages.is_empty() {
            return Err(FlowError::EmptyFlow(self.flow.slug.clone()));
        }
        tracing::debug!(flow = %self.flow.slug, stages = stages.len(), "Planned flow");
        Ok(FlowPlan::new(self.flow, stages, context))
    }

    /// Checks the flow-level policies.
    ///
    /// ## Errors
    ///
    /// Returns `FlowError::FlowNonApplicable` carrying the policy messages.
    pub async fn check_applicable(
        &self,
        policies: &dyn PolicyEngine,
        context: &PlanContext,
    ) -> FlowResult<()> {
        let result = policies
            .evaluate(&self.flow.policies, self.flow.policy_engine_mode, context)
            .await?;
        if result.passing {
            Ok(())
        } else {
            Err(FlowError::FlowNonApplicable {
                slug: self.flow.slug.clone(),
                messages: result.messages,
            })
        }
    }

    /// Schedules every binding whose policies pass, in binding order.
    ///
    /// The result may be empty.
    pub async fn plan_stages(
        &self,
        policies: &dyn PolicyEngine,
        context: &PlanContext,
    ) -> FlowResult<Vec<PlannedStage>> {
        let mut stages = Vec::new();
        for binding in self.flow.ordered_bindings() {
            let result = policies
                .evaluate(&binding.policies, binding.policy_engine_mode, context)
                .await?;
            if result.passing {
                stages.push(PlannedStage::from_binding(binding));
            } else {
                tracing::debug!(
                    flow = %self.flow.slug,
                    stage = %binding.stage.name,
                    "Binding policies failed, stage not planned"
                );
            }
        }
        Ok(stages)
    }
}
