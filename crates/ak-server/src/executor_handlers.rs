//! Flow executor endpoints.
//!
//! `GET` returns the current challenge, `POST` submits a response to it and
//! `DELETE` drops the session's plan. Every response echoes the session id
//! in the [`SESSION_HEADER`] header.

use ak_flows::{ContextKey, ExecutorResponse, FlowRequest};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "x-authentik-session";

/// Query parameter naming where to go once the flow completes.
pub const NEXT_PARAM: &str = "next";

const MAX_SESSION_ID_LEN: usize = 128;

/// Returns the current challenge for the session, planning the flow if needed.
pub async fn get_challenge(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let session_id = session_id(&headers);
    let request = flow_request(&session_id, slug, query, &state.config.redirect_hosts);

    let result = state.executor.get(&request).await.map_err(ApiError::from);
    with_session(render(result), &session_id)
}

/// Submits a challenge response.
pub async fn post_response(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let session_id = session_id(&headers);
    let request = flow_request(&session_id, slug, query, &state.config.redirect_hosts);

    let result = state
        .executor
        .post(&request, body)
        .await
        .map_err(ApiError::from);
    with_session(render(result), &session_id)
}

/// Drops the session's plan.
pub async fn cancel(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    let session_id = session_id(&headers);
    tracing::debug!(session_id = %session_id, flow = %slug, "Cancelling flow");

    let result: ApiResult<StatusCode> = state
        .executor
        .cancel(&session_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(ApiError::from);
    with_session(result.into_response(), &session_id)
}

fn render(result: ApiResult<ExecutorResponse>) -> Response {
    match result {
        Ok(ExecutorResponse::Aborted { flow, error }) => {
            tracing::debug!(flow = %flow, error = %error, "Flow aborted");
            ApiError::Flow(error).into_response()
        }
        Ok(response) => Json(response.into_challenge()).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Reads the session id from the request, minting one when absent.
fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_SESSION_ID_LEN)
        .map_or_else(|| Uuid::now_v7().to_string(), String::from)
}

fn with_session(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(SESSION_HEADER), value);
    }
    response
}

/// Builds the executor request.
///
/// `next` seeds the completion redirect when [`is_allowed_redirect`] accepts
/// it. Reserved context keys are never taken from the query string;
/// everything else is kept under the `request` scratch namespace.
fn flow_request(
    session_id: &str,
    slug: String,
    query: Vec<(String, String)>,
    redirect_hosts: &[String],
) -> FlowRequest {
    let mut request = FlowRequest::new(session_id, slug);
    for (name, value) in query {
        if name == NEXT_PARAM {
            if is_allowed_redirect(&value, redirect_hosts) {
                request = request.with_param(ContextKey::Redirect.as_str(), value);
            } else {
                tracing::warn!(next = %value, "Ignoring redirect to a foreign host");
            }
        } else if ContextKey::parse(&name).is_some() {
            tracing::debug!(param = %name, "Ignoring reserved query parameter");
        } else {
            request = request.with_param(name, value);
        }
    }
    request
}

/// Accepts same-origin paths and absolute http(s) URLs on an allowed host.
///
/// Scheme-relative (`//host`) and backslash forms are rejected since
/// browsers resolve them to other hosts.
fn is_allowed_redirect(target: &str, hosts: &[String]) -> bool {
    if target.contains('\\') {
        return false;
    }
    if target.starts_with('/') {
        return !target.starts_with("//");
    }
    Url::parse(target).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https")
            && url
                .host_str()
                .is_some_and(|host| hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)))
    })
}
