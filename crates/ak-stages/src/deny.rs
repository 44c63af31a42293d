//! Deny stage.

use ak_flows::{
    components, ChallengeKind, ChallengeResponseKind, FlowError, FlowPlan, FlowResult,
    StageContext, StageOutcome, StageView,
};
use ak_model::{DenyStage, StageKind};
use async_trait::async_trait;

/// Message used when the stage has none configured.
pub const DEFAULT_DENY_MESSAGE: &str = "Access denied.";

/// View for [`DenyStage`]: shows an access denied page, then aborts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyStageView;

impl DenyStageView {
    fn message<'a>(ctx: &StageContext<'a>) -> FlowResult<&'a str> {
        match &ctx.stage.stage.kind {
            StageKind::Deny(DenyStage { deny_message }) => Ok(deny_message
                .as_deref()
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_DENY_MESSAGE)),
            other => Err(FlowError::stage_invalid(format!(
                "deny view bound to a {} stage",
                other.type_tag()
            ))),
        }
    }
}

#[async_trait]
impl StageView for DenyStageView {
    fn component(&self) -> &'static str {
        components::ACCESS_DENIED
    }

    async fn get_challenge(
        &self,
        ctx: &StageContext<'_>,
        _plan: &FlowPlan,
    ) -> FlowResult<ChallengeKind> {
        Ok(ChallengeKind::AccessDenied {
            error_message: Some(Self::message(ctx)?.to_string()),
        })
    }

    async fn challenge_valid(
        &self,
        ctx: &StageContext<'_>,
        _plan: &mut FlowPlan,
        _response: ChallengeResponseKind,
    ) -> FlowResult<StageOutcome> {
        Ok(StageOutcome::invalid(Self::message(ctx)?))
    }
}
