//! Redirect stage.
//!
//! Sends the client to a URL, or moves execution into another flow. The
//! target is picked in this order:
//!
//! 1. `redirect_stage_target` in the plan context
//! 2. the stage's `target_static`
//! 3. the stage's `target_flow`
//!
//! A context override may name a flow with the `ak-flow:<slug>` scheme. If
//! that flow does not exist the override is ignored with a warning and the
//! configured targets are used instead.

use ak_flows::{
    components, ChallengeKind, ChallengeResponseKind, FlowError, FlowPlan, FlowResult,
    StageContext, StageOutcome, StageView, PLAN_CONTEXT_REDIRECT_STAGE_TARGET,
};
use ak_model::{interface_path, RedirectStage, StageKind};
use ak_storage::FlowProvider;
use async_trait::async_trait;
use url::Url;

/// URL scheme naming a flow by slug.
pub const URL_SCHEME_FLOW: &str = "ak-flow";

/// Raised when no target can be resolved at execution time.
pub const NO_TARGET_FOUND: &str =
    "No target found for Redirect stage. The stage's target_flow may have been deleted.";

/// Where a redirect stage sends the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    /// A URL, used as-is.
    Url(String),
    /// Another flow.
    Flow {
        /// Flow slug.
        slug: String,
        /// Carry the current context over.
        keep_context: bool,
    },
}

impl RedirectTarget {
    /// The value put in the challenge's `to`.
    #[must_use]
    pub fn to(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Flow { slug, .. } => interface_path(slug),
        }
    }
}

/// View for [`RedirectStage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectStageView;

impl RedirectStageView {
    /// Resolves the target for the current stage.
    ///
    /// ## Errors
    ///
    /// `FlowError::StageInvalid` when nothing resolves.
    pub async fn resolve(
        &self,
        ctx: &StageContext<'_>,
        plan: &FlowPlan,
    ) -> FlowResult<RedirectTarget> {
        let config = redirect_config(ctx)?;

        if let Some(target) = plan
            .context
            .redirect_stage_target()
            .filter(|target| !target.is_empty())
        {
            if let Some(resolved) = parse_target(target, config, ctx.flows).await? {
                return Ok(resolved);
            }
        }

        if let Some(url) = config.static_target() {
            return Ok(RedirectTarget::Url(url.to_string()));
        }

        if let Some(slug) = config.flow_target() {
            if ctx.flows.exists(slug).await? {
                return Ok(RedirectTarget::Flow {
                    slug: slug.to_string(),
                    keep_context: config.keep_context,
                });
            }
            tracing::warn!(
                stage = %ctx.stage.name(),
                target_flow = slug,
                "Redirect stage target flow does not exist"
            );
        }

        Err(FlowError::stage_invalid(NO_TARGET_FOUND))
    }
}

#[async_trait]
impl StageView for RedirectStageView {
    fn component(&self) -> &'static str {
        components::REDIRECT
    }

    async fn get_challenge(
        &self,
        ctx: &StageContext<'_>,
        plan: &FlowPlan,
    ) -> FlowResult<ChallengeKind> {
        let target = self.resolve(ctx, plan).await?;
        Ok(ChallengeKind::Redirect { to: target.to() })
    }

    async fn challenge_valid(
        &self,
        ctx: &StageContext<'_>,
        plan: &mut FlowPlan,
        _response: ChallengeResponseKind,
    ) -> FlowResult<StageOutcome> {
        match self.resolve(ctx, plan).await? {
            RedirectTarget::Url(_) => Ok(StageOutcome::Ok),
            RedirectTarget::Flow { slug, keep_context } => Ok(StageOutcome::FlowSwitch {
                target_flow: slug,
                keep_context,
            }),
        }
    }
}

fn redirect_config<'a>(ctx: &StageContext<'a>) -> FlowResult<&'a RedirectStage> {
    match &ctx.stage.stage.kind {
        StageKind::Redirect(config) => Ok(config),
        other => Err(FlowError::stage_invalid(format!(
            "redirect view bound to a {} stage",
            other.type_tag()
        ))),
    }
}

/// Interprets a context override.
///
/// Returns `None` when the override names a flow that does not exist.
async fn parse_target(
    target: &str,
    config: &RedirectStage,
    flows: &dyn FlowProvider,
) -> FlowResult<Option<RedirectTarget>> {
    let Ok(parsed) = Url::parse(target) else {
        return Ok(Some(RedirectTarget::Url(target.to_string())));
    };
    if parsed.scheme() != URL_SCHEME_FLOW {
        return Ok(Some(RedirectTarget::Url(target.to_string())));
    }

    let slug = parsed.path();
    if !slug.is_empty() && flows.exists(slug).await? {
        return Ok(Some(RedirectTarget::Flow {
            slug: slug.to_string(),
            keep_context: config.keep_context,
        }));
    }

    tracing::warn!(
        target,
        "{PLAN_CONTEXT_REDIRECT_STAGE_TARGET} is present in plan context, but a Flow with that \
         slug could not be found. Continuing as if it was not set."
    );
    Ok(None)
}
