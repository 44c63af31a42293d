//! Definition endpoint integration tests.

use ak_integration_tests::TestEnv;
use ak_model::{DummyStage, Flow, FlowDesignation, RedirectStage, Stage, StageKind};
use reqwest::StatusCode;
use serde_json::{json, Value};

/// Tests health endpoints.
#[tokio::test]
async fn test_health_endpoints() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.client.get(env.url("/health")).send().await?;
    assert!(
        response.status().is_success(),
        "Health endpoint should return success"
    );
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "healthy");

    for path in ["/health/live", "/health/ready"] {
        let response = env.client.get(env.url(path)).send().await?;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    Ok(())
}

/// Tests saving, reading and listing flows.
#[tokio::test]
async fn test_flow_round_trip() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let flow = Flow::new("login", FlowDesignation::Authentication)
        .with_stage(Stage::new("dummy", StageKind::Dummy(DummyStage::default())));

    let response = env.put_flow(&flow).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let fetched: Flow = env
        .client
        .get(env.url("/api/v3/flows/instances/login/"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(fetched, flow);

    let listed: Vec<Flow> = env
        .client
        .get(env.url("/api/v3/flows/instances/"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listed.len(), 1);

    let response = env
        .client
        .get(env.url("/api/v3/flows/instances/missing/"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

/// Tests that a redirect stage without targets cannot be saved.
#[tokio::test]
async fn test_redirect_without_target_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let flow = Flow::new("login", FlowDesignation::Authentication).with_stage(Stage::new(
        "redirect",
        StageKind::Redirect(RedirectStage::default()),
    ));

    let response = env.put_flow(&flow).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(
        body["details"]["bindings.redirect.non_field_errors"][0],
        "At least one redirect target should be present."
    );

    Ok(())
}

/// Tests that the slug in the body must match the URL.
#[tokio::test]
async fn test_slug_mismatch_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let flow = Flow::new("login", FlowDesignation::Authentication);

    let response = env
        .client
        .put(env.url("/api/v3/flows/instances/other/"))
        .json(&flow)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert!(body["details"]["slug"].is_array());

    Ok(())
}

/// Tests stage validation without saving.
#[tokio::test]
async fn test_stage_validation() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let url = env.url("/api/v3/stages/validate/");

    let response = env
        .client
        .post(&url)
        .json(&json!({"name": "to-enroll", "type": "redirect", "target_flow": "enroll"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["valid"], true);
    assert_eq!(body["type"], "redirect");

    let response = env
        .client
        .post(&url)
        .json(&json!({"name": "nowhere", "type": "redirect"}))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(
        body["details"]["non_field_errors"][0],
        "At least one redirect target should be present."
    );

    Ok(())
}
