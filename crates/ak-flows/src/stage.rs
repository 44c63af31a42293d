//! Stage contract.
//!
//! Every stage type implements [`StageView`]. The executor asks the view for
//! a challenge when the stage becomes current, and hands it the client's
//! response. The view reports back with a [`StageOutcome`]; it never drives
//! the plan forward itself.

use ak_storage::FlowProvider;
use async_trait::async_trait;

use crate::challenge::{ChallengeKind, ChallengeResponseKind};
use crate::error::FlowResult;
use crate::plan::{FlowPlan, PlannedStage};

/// What a stage decided about a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage is done; advance the plan.
    Ok,
    /// Re-issue the challenge with an error.
    Retry(String),
    /// The stage cannot continue; abort the flow.
    Invalid(String),
    /// Continue execution in another flow.
    FlowSwitch {
        /// Slug of the target flow.
        target_flow: String,
        /// Carry the current context into the target flow.
        keep_context: bool,
    },
}

impl StageOutcome {
    /// Creates a retry outcome.
    #[must_use]
    pub fn retry(message: impl Into<String>) -> Self {
        Self::Retry(message.into())
    }

    /// Creates an invalid outcome.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// What a stage sees of the world while it runs.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    /// The scheduled stage, including its configuration.
    pub stage: &'a PlannedStage,
    /// Session executing the plan.
    pub session_id: &'a str,
    /// Flow lookup.
    pub flows: &'a dyn FlowProvider,
}

impl std::fmt::Debug for StageContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("stage", &self.stage.name())
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// Behavior of one stage type.
#[async_trait]
pub trait StageView: Send + Sync {
    /// Component of the challenges this view emits and the responses it accepts.
    fn component(&self) -> &'static str;

    /// Builds the challenge for the current stage.
    ///
    /// Must not mutate anything: the executor may call it again to replay
    /// the challenge.
    ///
    /// ## Errors
    ///
    /// `FlowError::StageInvalid` aborts the flow.
    async fn get_challenge(
        &self,
        ctx: &StageContext<'_>,
        plan: &FlowPlan,
    ) -> FlowResult<ChallengeKind>;

    /// Validates a response and decides how execution continues.
    ///
    /// The response component has already been checked against
    /// [`StageView::component`]. The view may write to `plan.context`.
    ///
    /// ## Errors
    ///
    /// Any error aborts the flow.
    async fn challenge_valid(
        &self,
        ctx: &StageContext<'_>,
        plan: &mut FlowPlan,
        response: ChallengeResponseKind,
    ) -> FlowResult<StageOutcome>;
}
