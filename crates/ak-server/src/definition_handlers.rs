//! Flow and stage definition endpoints.
//!
//! Definitions are validated when saved. A definition rejected here never
//! reaches the executor.

use ak_model::{validate_flow, validate_stage, Flow, Stage, ValidationError};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Result of a stage validation request.
#[derive(Debug, Serialize)]
pub struct StageValidation {
    /// Always `true`; rejected stages are reported as errors.
    pub valid: bool,
    /// Stage type tag.
    pub r#type: &'static str,
    /// Human-readable type name.
    pub verbose_name: &'static str,
    /// Admin form component for the stage type.
    pub component: &'static str,
}

/// Lists all flows.
pub async fn list_flows(State(state): State<AppState>) -> ApiResult<Json<Vec<Flow>>> {
    Ok(Json(state.flows.list().await?))
}

/// Gets a flow by slug.
pub async fn get_flow(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Flow>> {
    state
        .flows
        .get_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Flow", slug))
}

/// Creates or replaces a flow.
pub async fn put_flow(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(flow): Json<Flow>,
) -> ApiResult<Json<Flow>> {
    if flow.slug != slug {
        return Err(ValidationError::field("slug", "Slug in body does not match the URL.").into());
    }
    validate_flow(&flow)?;

    if let Err(e) = state.registry().validate_required([&flow]) {
        return Err(ApiError::BadRequest(e.to_string()));
    }

    state.flows.save(flow.clone()).await?;
    tracing::info!(flow = %flow.slug, stages = flow.bindings.len(), "Flow saved");
    Ok(Json(flow))
}

/// Deletes a flow.
///
/// Plans already executing keep their stages; a redirect stage pointing at
/// the deleted flow fails when it runs.
pub async fn delete_flow(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    state.flows.delete(&slug).await?;
    tracing::info!(flow = %slug, "Flow deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Validates a stage definition without saving it.
pub async fn validate_stage_definition(
    Json(stage): Json<Stage>,
) -> ApiResult<Json<StageValidation>> {
    validate_stage(&stage)?;
    Ok(Json(StageValidation {
        valid: true,
        r#type: stage.type_tag(),
        verbose_name: stage.kind.verbose_name(),
        component: stage.kind.component(),
    }))
}
