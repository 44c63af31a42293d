//! Dummy stage, for testing flows.

use ak_flows::{
    components, ChallengeKind, ChallengeResponseKind, FlowError, FlowPlan, FlowResult,
    StageContext, StageOutcome, StageView,
};
use ak_model::{DummyStage, StageKind};
use async_trait::async_trait;

/// View for [`DummyStage`]. Accepts any response.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyStageView;

#[async_trait]
impl StageView for DummyStageView {
    fn component(&self) -> &'static str {
        components::DUMMY
    }

    async fn get_challenge(
        &self,
        ctx: &StageContext<'_>,
        _plan: &FlowPlan,
    ) -> FlowResult<ChallengeKind> {
        match &ctx.stage.stage.kind {
            StageKind::Dummy(DummyStage { throw_error: true }) => Err(FlowError::stage_invalid(
                format!("Dummy stage '{}' configured to fail.", ctx.stage.name()),
            )),
            _ => Ok(ChallengeKind::Dummy),
        }
    }

    async fn challenge_valid(
        &self,
        _ctx: &StageContext<'_>,
        _plan: &mut FlowPlan,
        _response: ChallengeResponseKind,
    ) -> FlowResult<StageOutcome> {
        Ok(StageOutcome::Ok)
    }
}
