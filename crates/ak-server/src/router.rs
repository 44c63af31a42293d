//! Router configuration.
//!
//! This module creates the main Axum router that combines all endpoints.

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::definition_handlers;
use crate::executor_handlers;
use crate::state::AppState;

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let health = Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .route("/health/ready", get(readiness_check));

    let executor = Router::new().route(
        "/api/v3/flows/executor/{slug}/",
        get(executor_handlers::get_challenge)
            .post(executor_handlers::post_response)
            .delete(executor_handlers::cancel),
    );

    let definitions = Router::new()
        .route(
            "/api/v3/flows/instances/",
            get(definition_handlers::list_flows),
        )
        .route(
            "/api/v3/flows/instances/{slug}/",
            get(definition_handlers::get_flow)
                .put(definition_handlers::put_flow)
                .delete(definition_handlers::delete_flow),
        )
        .route(
            "/api/v3/stages/validate/",
            post(definition_handlers::validate_stage_definition),
        );

    Router::new()
        .merge(health)
        .merge(executor)
        .merge(definitions)
        .route("/", get(root))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Root endpoint.
async fn root() -> &'static str {
    "authentik flow executor"
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness check endpoint.
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Readiness check endpoint.
///
/// Ready once the flow store answers.
async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    match state.flows.list().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Flow store not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
