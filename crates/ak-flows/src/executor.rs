//! Flow executor.
//!
//! The executor drives a plan one request at a time:
//!
//! ```text
//! AWAITING_CHALLENGE --get_challenge--> AWAITING_RESPONSE
//! AWAITING_RESPONSE  --Ok------------> next stage | COMPLETED
//! AWAITING_RESPONSE  --Retry---------> AWAITING_RESPONSE (errors attached)
//! AWAITING_RESPONSE  --Invalid-------> ABORTED
//! AWAITING_RESPONSE  --FlowSwitch----> first stage of the target flow
//! ```
//!
//! Each request loads the plan, runs stage logic to completion, and saves
//! the plan as its last step. Terminal states delete the plan.
//!
//! The session's plan is not tied to the URL slug once it switched flows: a
//! response stamped with its id still reaches it, and requesting the flow a
//! pending redirect points at performs the switch.

use std::collections::BTreeMap;
use std::sync::Arc;

use ak_core::{ExecutorConfig, FlowEvent, FlowEventType};
use ak_model::Flow;
use ak_storage::{FlowProvider, PlanStore};
use serde_json::Value;

use crate::challenge::{
    components, Challenge, ChallengeResponse, ChallengeResponseKind, ErrorDetail,
    NON_FIELD_ERRORS,
};
use crate::context::PlanContext;
use crate::error::{FlowError, FlowResult};
use crate::plan::{ExecutionState, FlowPlan};
use crate::planner::FlowPlanner;
use crate::policy::PolicyEngine;
use crate::registry::StageRegistry;
use crate::stage::{StageContext, StageOutcome};

/// A request against the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRequest {
    /// Session the plan belongs to.
    pub session_id: String,
    /// Slug of the requested flow.
    pub flow_slug: String,
    /// Values to seed a new plan's context with.
    pub params: Vec<(String, String)>,
}

impl FlowRequest {
    /// Creates a request without parameters.
    #[must_use]
    pub fn new(session_id: impl Into<String>, flow_slug: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            flow_slug: flow_slug.into(),
            params: Vec::new(),
        }
    }

    /// Adds a context seed parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

/// What the executor tells the client.
#[derive(Debug)]
pub enum ExecutorResponse {
    /// Render this challenge.
    Challenge(Challenge),
    /// The flow finished; navigate to `to`.
    Completed {
        /// Final redirect.
        to: String,
    },
    /// The flow failed.
    Aborted {
        /// Slug of the flow that failed.
        flow: String,
        /// Why.
        error: FlowError,
    },
}

impl ExecutorResponse {
    /// Execution state this response leaves the session in.
    #[must_use]
    pub const fn state(&self) -> ExecutionState {
        match self {
            Self::Challenge(_) => ExecutionState::AwaitingResponse,
            Self::Completed { .. } => ExecutionState::Completed,
            Self::Aborted { .. } => ExecutionState::Aborted,
        }
    }

    /// Converts the response into the challenge sent to the client.
    ///
    /// Completion becomes a redirect; failure becomes a flow error carrying
    /// only the end-user message.
    #[must_use]
    pub fn into_challenge(self) -> Challenge {
        match self {
            Self::Challenge(challenge) => challenge,
            Self::Completed { to } => Challenge::redirect(to),
            Self::Aborted { error, .. } => Challenge::flow_error(error.public_message()),
        }
    }
}

/// Drives flow plans for sessions.
#[derive(Clone)]
pub struct FlowExecutor {
    flows: Arc<dyn FlowProvider>,
    plans: Arc<dyn PlanStore>,
    policies: Arc<dyn PolicyEngine>,
    registry: Arc<StageRegistry>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for FlowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowExecutor")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FlowExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(
        flows: Arc<dyn FlowProvider>,
        plans: Arc<dyn PlanStore>,
        policies: Arc<dyn PolicyEngine>,
        registry: Arc<StageRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            flows,
            plans,
            policies,
            registry,
            config,
        }
    }

    /// Executor configuration.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Stage registry.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Returns the current challenge, planning the flow if needed.
    ///
    /// ## Errors
    ///
    /// Planning failures (unknown flow, non-applicable flow, empty plan)
    /// and storage failures. Failures of an in-progress plan are reported
    /// as [`ExecutorResponse::Aborted`].
    pub async fn get(&self, request: &FlowRequest) -> FlowResult<ExecutorResponse> {
        let plan = match self.load(&request.session_id).await? {
            Some(plan) if plan.flow_slug() == request.flow_slug => plan,
            Some(plan) => {
                if let Some(response) = self.follow_redirect(request, &plan).await? {
                    return Ok(response);
                }
                log_replaced(request, &plan);
                self.plan(request).await?
            }
            None => self.plan(request).await?,
        };
        self.next_challenge(request, plan, BTreeMap::new()).await
    }

    /// Submits a response to the current challenge.
    ///
    /// ## Errors
    ///
    /// As for [`FlowExecutor::get`], plus `FlowError::InvalidResponse` and
    /// `FlowError::ComponentMismatch`, which leave the plan untouched.
    ///
    /// A response stamped with the stored plan's id answers that plan even
    /// after it switched to another flow.
    pub async fn post(&self, request: &FlowRequest, body: Value) -> FlowResult<ExecutorResponse> {
        let response = ChallengeResponse::from_value(body)?;
        let mut plan = match self.load(&request.session_id).await? {
            Some(plan)
                if plan.flow_slug() == request.flow_slug
                    || response.plan_id == Some(plan.id()) =>
            {
                plan
            }
            Some(plan) => {
                log_replaced(request, &plan);
                self.plan(request).await?
            }
            None => self.plan(request).await?,
        };

        if is_stale(&plan, &response) {
            FlowEvent::builder(FlowEventType::ResponseReplayed)
                .flow(plan.flow_slug())
                .session(&request.session_id)
                .position(plan.position())
                .detail(
                    "response_position",
                    response.position.map_or_else(String::new, |p| p.to_string()),
                )
                .emit();
            return self.next_challenge(request, plan, BTreeMap::new()).await;
        }

        let Some(current) = plan.current().cloned() else {
            return self.complete(request, plan).await;
        };
        let Some(view) = self.registry.get(current.type_tag()) else {
            let error = FlowError::UnknownStageType(current.type_tag().to_string());
            return self.abort(request, &plan, error).await;
        };
        if response.component() != view.component() {
            return Err(FlowError::ComponentMismatch {
                expected: view.component().to_string(),
                received: response.component().to_string(),
            });
        }

        let ctx = StageContext {
            stage: &current,
            session_id: &request.session_id,
            flows: self.flows.as_ref(),
        };
        let outcome = match view.challenge_valid(&ctx, &mut plan, response.kind).await {
            Ok(outcome) => outcome,
            Err(e) => return self.abort(request, &plan, e).await,
        };

        match outcome {
            StageOutcome::Ok => {
                FlowEvent::builder(FlowEventType::StageCompleted)
                    .flow(plan.flow_slug())
                    .session(&request.session_id)
                    .stage(current.name())
                    .position(plan.position())
                    .emit();
                plan.advance();
                self.next_challenge(request, plan, BTreeMap::new()).await
            }
            StageOutcome::Retry(message) => {
                let attempts = plan.record_attempt();
                if attempts >= self.config.max_stage_attempts {
                    let error = FlowError::RetryLimitExceeded {
                        stage: current.name().to_string(),
                        attempts,
                    };
                    return self.abort(request, &plan, error).await;
                }
                FlowEvent::builder(FlowEventType::StageRetried)
                    .flow(plan.flow_slug())
                    .session(&request.session_id)
                    .stage(current.name())
                    .position(plan.position())
                    .detail("attempts", attempts.to_string())
                    .detail("reason", message.as_str())
                    .emit();
                let mut errors = BTreeMap::new();
                errors.insert(
                    NON_FIELD_ERRORS.to_string(),
                    vec![ErrorDetail::invalid(message)],
                );
                self.next_challenge(request, plan, errors).await
            }
            StageOutcome::Invalid(message) => {
                self.abort(request, &plan, FlowError::StageInvalid(message))
                    .await
            }
            StageOutcome::FlowSwitch {
                target_flow,
                keep_context,
            } => {
                self.switch_flow(request, plan, &target_flow, keep_context)
                    .await
            }
        }
    }

    /// Discards the session's plan.
    ///
    /// ## Errors
    ///
    /// Returns storage errors.
    pub async fn cancel(&self, session_id: &str) -> FlowResult<()> {
        self.plans.delete(session_id).await?;
        FlowEvent::builder(FlowEventType::FlowCancelled)
            .session(session_id)
            .emit();
        Ok(())
    }

    /// Loads the session's live plan.
    ///
    /// Plans that no longer decode, or that were left in a terminal state,
    /// read as absent.
    async fn load(&self, session_id: &str) -> FlowResult<Option<FlowPlan>> {
        let Some(data) = self.plans.load(session_id).await? else {
            return Ok(None);
        };
        match FlowPlan::from_bytes(&data) {
            Ok(plan) if plan.state().is_terminal() => {
                tracing::debug!(
                    session_id,
                    state = ?plan.state(),
                    "Discarding finished plan"
                );
                Ok(None)
            }
            Ok(plan) => Ok(Some(plan)),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Discarding undecodable plan");
                Ok(None)
            }
        }
    }

    /// Follows a pending redirect challenge to the flow the client navigated to.
    ///
    /// A client that receives a redirect to `/if/flow/<slug>/` requests that
    /// flow directly instead of acknowledging the redirect. When the stored
    /// plan is waiting on exactly such a redirect, the request acknowledges
    /// it and the switch runs as if the response had been posted.
    async fn follow_redirect(
        &self,
        request: &FlowRequest,
        plan: &FlowPlan,
    ) -> FlowResult<Option<ExecutorResponse>> {
        if plan.state() != ExecutionState::AwaitingResponse {
            return Ok(None);
        }
        let Some(current) = plan.current() else {
            return Ok(None);
        };
        let Some(view) = self.registry.get(current.type_tag()) else {
            return Ok(None);
        };
        if view.component() != components::REDIRECT {
            return Ok(None);
        }

        let mut followed = plan.clone();
        let ctx = StageContext {
            stage: current,
            session_id: &request.session_id,
            flows: self.flows.as_ref(),
        };
        match view
            .challenge_valid(&ctx, &mut followed, ChallengeResponseKind::Redirect)
            .await
        {
            Ok(StageOutcome::FlowSwitch {
                target_flow,
                keep_context,
            }) if target_flow == request.flow_slug => {
                FlowEvent::builder(FlowEventType::StageCompleted)
                    .flow(plan.flow_slug())
                    .session(&request.session_id)
                    .stage(current.name())
                    .position(plan.position())
                    .detail("followed", target_flow.as_str())
                    .emit();
                self.switch_flow(request, followed, &target_flow, keep_context)
                    .await
                    .map(Some)
            }
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::debug!(
                    session_id = %request.session_id,
                    error = %e,
                    "Pending redirect does not lead to the requested flow"
                );
                Ok(None)
            }
        }
    }

    /// Plans the requested flow with a context seeded from the request.
    async fn plan(&self, request: &FlowRequest) -> FlowResult<FlowPlan> {
        let flow = self.resolve_flow(&request.flow_slug).await?;
        let mut context = PlanContext::new();
        context.seed(
            request
                .params
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        let plan = FlowPlanner::new(&flow)
            .plan(self.policies.as_ref(), context)
            .await?;

        FlowEvent::builder(FlowEventType::FlowPlanned)
            .flow(&flow.slug)
            .session(&request.session_id)
            .detail("stages", plan.remaining().to_string())
            .emit();
        Ok(plan)
    }

    async fn resolve_flow(&self, slug: &str) -> FlowResult<Flow> {
        self.flows
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| FlowError::FlowNotFound(slug.to_string()))
    }

    /// Emits the challenge of the current stage.
    ///
    /// Stages marked for re-evaluation whose policies no longer pass are
    /// dropped first. An exhausted plan completes.
    async fn next_challenge(
        &self,
        request: &FlowRequest,
        mut plan: FlowPlan,
        errors: BTreeMap<String, Vec<ErrorDetail>>,
    ) -> FlowResult<ExecutorResponse> {
        loop {
            let Some(current) = plan.current().cloned() else {
                return self.complete(request, plan).await;
            };

            if current.re_evaluate && plan.state() == ExecutionState::AwaitingChallenge {
                let result = match self
                    .policies
                    .evaluate(&current.policies, current.policy_engine_mode, &plan.context)
                    .await
                {
                    Ok(result) => result,
                    Err(e) => return self.abort(request, &plan, e).await,
                };
                if !result.passing {
                    FlowEvent::builder(FlowEventType::StageSkipped)
                        .flow(plan.flow_slug())
                        .session(&request.session_id)
                        .stage(current.name())
                        .position(plan.position())
                        .emit();
                    plan.advance();
                    continue;
                }
            }

            let Some(view) = self.registry.get(current.type_tag()) else {
                let error = FlowError::UnknownStageType(current.type_tag().to_string());
                return self.abort(request, &plan, error).await;
            };
            let ctx = StageContext {
                stage: &current,
                session_id: &request.session_id,
                flows: self.flows.as_ref(),
            };
            let kind = match view.get_challenge(&ctx, &plan).await {
                Ok(kind) => kind,
                Err(e) => return self.abort(request, &plan, e).await,
            };

            plan.set_state(ExecutionState::AwaitingResponse);
            let mut challenge = Challenge::new(kind)
                .with_flow_info(plan.flow_info().clone())
                .with_stamp(plan.id(), plan.position());
            challenge.response_errors = errors;

            self.persist(&request.session_id, &mut plan).await?;
            FlowEvent::builder(FlowEventType::StageChallenged)
                .flow(plan.flow_slug())
                .session(&request.session_id)
                .stage(current.name())
                .position(plan.position())
                .detail("component", challenge.component())
                .emit();
            return Ok(ExecutorResponse::Challenge(challenge));
        }
    }

    /// Replaces the rest of the plan with the stages of another flow.
    async fn switch_flow(
        &self,
        request: &FlowRequest,
        mut plan: FlowPlan,
        target: &str,
        keep_context: bool,
    ) -> FlowResult<ExecutorResponse> {
        let flow = match self.flows.get_by_slug(target).await? {
            Some(flow) => flow,
            None => {
                return self
                    .abort(request, &plan, FlowError::FlowNotFound(target.to_string()))
                    .await
            }
        };

        let fresh = (!keep_context).then(PlanContext::new);
        let planned = {
            let context = fresh.as_ref().unwrap_or(&plan.context);
            let planner = FlowPlanner::new(&flow);
            match planner.check_applicable(self.policies.as_ref(), context).await {
                Ok(()) => planner.plan_stages(self.policies.as_ref(), context).await,
                Err(e) => Err(e),
            }
        };
        let stages = match planned {
            Ok(stages) if stages.is_empty() => {
                return self
                    .abort(request, &plan, FlowError::EmptyFlow(flow.slug.clone()))
                    .await
            }
            Ok(stages) => stages,
            Err(e) => return self.abort(request, &plan, e).await,
        };

        FlowEvent::builder(FlowEventType::FlowSwitched)
            .flow(plan.flow_slug())
            .session(&request.session_id)
            .position(plan.position())
            .detail("target", flow.slug.as_str())
            .detail("keep_context", keep_context.to_string())
            .emit();
        plan.switch_flow(&flow, stages, fresh);
        self.next_challenge(request, plan, BTreeMap::new()).await
    }

    async fn complete(
        &self,
        request: &FlowRequest,
        plan: FlowPlan,
    ) -> FlowResult<ExecutorResponse> {
        self.plans.delete(&request.session_id).await?;
        let to = plan
            .context
            .redirect()
            .map_or_else(|| self.config.default_redirect.clone(), str::to_string);

        FlowEvent::builder(FlowEventType::FlowCompleted)
            .flow(plan.flow_slug())
            .session(&request.session_id)
            .position(plan.position())
            .detail("to", to.as_str())
            .emit();
        Ok(ExecutorResponse::Completed { to })
    }

    async fn abort(
        &self,
        request: &FlowRequest,
        plan: &FlowPlan,
        error: FlowError,
    ) -> FlowResult<ExecutorResponse> {
        self.plans.delete(&request.session_id).await?;

        let mut event = FlowEvent::builder(FlowEventType::FlowAborted)
            .failure(error.to_string())
            .flow(plan.flow_slug())
            .session(&request.session_id)
            .position(plan.position());
        if let Some(stage) = plan.current() {
            event = event.stage(stage.name());
        }
        event.emit();

        Ok(ExecutorResponse::Aborted {
            flow: plan.flow_slug().to_string(),
            error,
        })
    }

    async fn persist(&self, session_id: &str, plan: &mut FlowPlan) -> FlowResult<()> {
        plan.touch(self.config.plan_ttl());
        let data = plan.to_bytes()?;
        self.plans
            .save(session_id, &data, self.config.plan_ttl())
            .await?;
        Ok(())
    }
}

fn log_replaced(request: &FlowRequest, plan: &FlowPlan) {
    tracing::debug!(
        session_id = %request.session_id,
        stored = %plan.flow_slug(),
        requested = %request.flow_slug,
        "Stored plan belongs to another flow, planning again"
    );
}

/// A response answers an older challenge if its stamp differs from the plan.
///
/// Unstamped responses are always dispatched.
fn is_stale(plan: &FlowPlan, response: &ChallengeResponse) -> bool {
    response.plan_id.is_some_and(|id| id != plan.id())
        || response.position.is_some_and(|p| p != plan.position())
}
