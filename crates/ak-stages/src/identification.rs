//! Identification stage.

use ak_flows::{
    components, ChallengeKind, ChallengeResponseKind, FlowError, FlowPlan, FlowResult,
    StageContext, StageOutcome, StageView,
};
use ak_model::{IdentificationStage, StageKind, UserField};
use async_trait::async_trait;

/// Shown when the identifier is missing or does not fit any allowed field.
pub const IDENTIFICATION_FAILED: &str = "Failed to authenticate.";

/// View for [`IdentificationStage`].
///
/// Records the entered identifier as `pending_user_identifier`. No user
/// lookup happens here.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentificationStageView;

#[async_trait]
impl StageView for IdentificationStageView {
    fn component(&self) -> &'static str {
        components::IDENTIFICATION
    }

    async fn get_challenge(
        &self,
        ctx: &StageContext<'_>,
        _plan: &FlowPlan,
    ) -> FlowResult<ChallengeKind> {
        let config = identification_config(ctx)?;
        Ok(ChallengeKind::Identification {
            user_fields: config.user_fields.clone(),
            primary_action: "Log in".to_string(),
        })
    }

    async fn challenge_valid(
        &self,
        ctx: &StageContext<'_>,
        plan: &mut FlowPlan,
        response: ChallengeResponseKind,
    ) -> FlowResult<StageOutcome> {
        let config = identification_config(ctx)?;
        let ChallengeResponseKind::Identification { uid_field } = response else {
            return Ok(StageOutcome::retry(IDENTIFICATION_FAILED));
        };

        let uid = uid_field.trim();
        if uid.is_empty() || !config.user_fields.iter().any(|field| accepts(*field, uid)) {
            tracing::debug!(stage = %ctx.stage.name(), "Identifier rejected");
            return Ok(StageOutcome::retry(IDENTIFICATION_FAILED));
        }

        let uid = if config.case_insensitive_matching {
            uid.to_lowercase()
        } else {
            uid.to_string()
        };
        plan.context.set_pending_user_identifier(uid);
        Ok(StageOutcome::Ok)
    }
}

fn accepts(field: UserField, uid: &str) -> bool {
    match field {
        UserField::Username => true,
        UserField::Email | UserField::Upn => uid.contains('@'),
    }
}

fn identification_config<'a>(ctx: &StageContext<'a>) -> FlowResult<&'a IdentificationStage> {
    match &ctx.stage.stage.kind {
        StageKind::Identification(config) => Ok(config),
        other => Err(FlowError::stage_invalid(format!(
            "identification view bound to a {} stage",
            other.type_tag()
        ))),
    }
}
