//! Flow plans.
//!
//! A plan is the per-execution snapshot of which stages will run, in which
//! order, together with the shared [`PlanContext`]. Plans are persisted
//! between requests as opaque bytes; everything needed to resume lives here.

use std::collections::VecDeque;
use std::time::Duration;

use ak_model::{Flow, FlowStageBinding, PolicyBinding, PolicyEngineMode, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::challenge::FlowInfo;
use crate::context::PlanContext;
use crate::error::FlowResult;

/// Where an execution currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// The next step is to emit a challenge for the current stage.
    #[default]
    AwaitingChallenge,
    /// A challenge was emitted and a response is expected.
    AwaitingResponse,
    /// The plan was exhausted.
    Completed,
    /// The flow failed.
    Aborted,
}

impl ExecutionState {
    /// Returns whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// A stage scheduled in a plan.
///
/// Carries a snapshot of the stage definition so that edits to the flow do
/// not affect executions already in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStage {
    /// Binding the stage was planned from.
    pub binding_id: Uuid,
    /// Stage definition.
    pub stage: Stage,
    /// Evaluate the binding policies again before the stage runs.
    #[serde(default)]
    pub re_evaluate: bool,
    /// How the binding policies combine.
    #[serde(default)]
    pub policy_engine_mode: PolicyEngineMode,
    /// Binding policies.
    #[serde(default)]
    pub policies: Vec<PolicyBinding>,
}

impl PlannedStage {
    /// Snapshots a flow binding.
    #[must_use]
    pub fn from_binding(binding: &FlowStageBinding) -> Self {
        Self {
            binding_id: binding.id,
            stage: binding.stage.clone(),
            re_evaluate: binding.re_evaluate_policies,
            policy_engine_mode: binding.policy_engine_mode,
            policies: binding.policies.clone(),
        }
    }

    /// Schedules a stage with no policies.
    #[must_use]
    pub fn unbound(stage: Stage) -> Self {
        Self {
            binding_id: Uuid::now_v7(),
            stage,
            re_evaluate: false,
            policy_engine_mode: PolicyEngineMode::Any,
            policies: Vec::new(),
        }
    }

    /// Stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.stage.name
    }

    /// Registry tag of the stage type.
    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        self.stage.type_tag()
    }
}

/// An in-progress flow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPlan {
    id: Uuid,
    flow_id: Uuid,
    flow_info: FlowInfo,
    stages: VecDeque<PlannedStage>,
    /// State shared by the stages.
    pub context: PlanContext,
    position: u64,
    attempts: u32,
    state: ExecutionState,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl FlowPlan {
    /// Creates a plan for a flow.
    #[must_use]
    pub fn new(
        flow: &Flow,
        stages: impl IntoIterator<Item = PlannedStage>,
        context: PlanContext,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            flow_id: flow.id,
            flow_info: FlowInfo::from_flow(flow),
            stages: stages.into_iter().collect(),
            context,
            position: 0,
            attempts: 0,
            state: ExecutionState::AwaitingChallenge,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Plan identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Identifier of the flow currently executing.
    #[must_use]
    pub const fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    /// Slug of the flow currently executing.
    #[must_use]
    pub fn flow_slug(&self) -> &str {
        &self.flow_info.slug
    }

    /// Flow metadata for challenges.
    #[must_use]
    pub const fn flow_info(&self) -> &FlowInfo {
        &self.flow_info
    }

    /// Monotonic counter of plan advances.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Failed attempts on the current stage.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Execution state.
    #[must_use]
    pub const fn state(&self) -> ExecutionState {
        self.state
    }

    /// Sets the execution state.
    pub fn set_state(&mut self, state: ExecutionState) {
        self.state = state;
    }

    /// When the plan was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the persisted plan expires, if it was persisted.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// The stage at the head of the plan.
    #[must_use]
    pub fn current(&self) -> Option<&PlannedStage> {
        self.stages.front()
    }

    /// Stages not yet completed, current first.
    pub fn stages(&self) -> impl Iterator<Item = &PlannedStage> {
        self.stages.iter()
    }

    /// Number of stages not yet completed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }

    /// Returns whether every stage has completed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.stages.is_empty()
    }

    /// Appends a stage to the end of the plan.
    pub fn append(&mut self, stage: PlannedStage) {
        self.stages.push_back(stage);
    }

    /// Schedules a stage directly after the current one.
    pub fn insert_next(&mut self, stage: PlannedStage) {
        let index = usize::from(!self.stages.is_empty());
        self.stages.insert(index, stage);
    }

    /// Removes the current stage and moves the position forward.
    pub fn advance(&mut self) -> Option<PlannedStage> {
        let stage = self.stages.pop_front();
        self.bump();
        stage
    }

    /// Replaces every remaining stage, the current one included.
    pub fn replace_remaining(&mut self, stages: impl IntoIterator<Item = PlannedStage>) {
        self.stages = stages.into_iter().collect();
        self.bump();
    }

    /// Moves execution to another flow.
    ///
    /// The remaining stages are replaced by `stages`. With `context` set the
    /// plan starts over from that context; otherwise the current one is kept.
    pub fn switch_flow(
        &mut self,
        flow: &Flow,
        stages: impl IntoIterator<Item = PlannedStage>,
        context: Option<PlanContext>,
    ) {
        self.flow_id = flow.id;
        self.flow_info = FlowInfo::from_flow(flow);
        if let Some(context) = context {
            self.context = context;
        }
        self.replace_remaining(stages);
    }

    /// Records a failed attempt on the current stage.
    ///
    /// Returns the number of failed attempts so far.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Sets the expiry for a plan about to be persisted.
    pub fn touch(&mut self, ttl: Duration) {
        self.expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
    }

    fn bump(&mut self) {
        self.position += 1;
        self.attempts = 0;
        self.state = ExecutionState::AwaitingChallenge;
    }

    /// Serializes the plan for the plan store.
    ///
    /// ## Errors
    ///
    /// Returns `FlowError::Serialization` if the context holds values that
    /// cannot be encoded.
    pub fn to_bytes(&self) -> FlowResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Restores a plan from the plan store.
    ///
    /// ## Errors
    ///
    /// Returns `FlowError::Serialization` for undecodable data.
    pub fn from_bytes(data: &[u8]) -> FlowResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}
