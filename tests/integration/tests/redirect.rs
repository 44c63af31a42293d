//! Redirect stage and flow switch integration tests.

use ak_integration_tests::TestEnv;
use ak_model::{DummyStage, Flow, FlowDesignation, RedirectStage, Stage, StageKind};
use reqwest::StatusCode;
use serde_json::json;

fn dummy(name: &str) -> Stage {
    Stage::new(name, StageKind::Dummy(DummyStage::default()))
}

fn login_with(redirect: RedirectStage) -> Flow {
    Flow::new("login", FlowDesignation::Authentication)
        .with_stage(Stage::new("redirect", StageKind::Redirect(redirect)))
        .with_stage(dummy("after-redirect"))
}

fn enrollment() -> Flow {
    Flow::new("enrollment", FlowDesignation::Enrollment).with_stage(dummy("enroll"))
}

fn follow_redirect() -> serde_json::Value {
    json!({"component": "xak-flow-redirect"})
}

/// Tests that a static target is challenged and the plan continues.
#[tokio::test]
async fn test_static_target_continues_plan() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([login_with(RedirectStage::to_static("https://example.com"))])
        .await?;
    let session = env.session();

    let reply = session.get("login").await?;
    assert_eq!(reply.component(), "xak-flow-redirect");
    assert_eq!(reply.body["to"], "https://example.com");

    let reply = session.post("login", follow_redirect()).await?;
    assert_eq!(reply.component(), "ak-stage-dummy");

    Ok(())
}

/// Tests that a flow target switches execution and keeps the context.
#[tokio::test]
async fn test_flow_target_switches_keeping_context() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([
        login_with(RedirectStage::to_flow("enrollment", true)),
        enrollment(),
    ])
    .await?;
    let session = env.session();

    let reply = session.get_with("login", &[("next", "/done/")]).await?;
    assert_eq!(reply.body["to"], "/if/flow/enrollment/");

    let reply = session.post("login", follow_redirect()).await?;
    assert_eq!(reply.component(), "ak-stage-dummy");
    assert_eq!(reply.body["flow_info"]["slug"], "enrollment");

    // The client continues at the target flow.
    let reply = session
        .post("enrollment", json!({"component": "ak-stage-dummy"}))
        .await?;
    assert_eq!(reply.component(), "xak-flow-redirect");
    assert_eq!(reply.body["to"], "/done/");

    Ok(())
}

/// Tests that a flow target without `keep_context` starts a fresh context.
#[tokio::test]
async fn test_flow_target_can_drop_context() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([
        login_with(RedirectStage::to_flow("enrollment", false)),
        enrollment(),
    ])
    .await?;
    let session = env.session();

    session.get_with("login", &[("next", "/done/")]).await?;
    session.post("login", follow_redirect()).await?;

    let reply = session
        .post("enrollment", json!({"component": "ak-stage-dummy"}))
        .await?;
    assert_eq!(reply.body["to"], "/");

    Ok(())
}

/// Tests that deleting the target flow makes the redirect stage fail.
#[tokio::test]
async fn test_deleted_target_flow_aborts() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([
        login_with(RedirectStage::to_flow("enrollment", true)),
        enrollment(),
    ])
    .await?;

    let response = env
        .client
        .delete(env.url("/api/v3/flows/instances/enrollment/"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let reply = env.session().get("login").await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.component(), "ak-stage-flow-error");
    assert_eq!(reply.body["error"], "This flow could not be completed.");

    Ok(())
}

/// Tests that a flow deleted between challenge and response aborts the switch.
#[tokio::test]
async fn test_target_deleted_mid_flow_aborts() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([
        login_with(RedirectStage::to_flow("enrollment", true)),
        enrollment(),
    ])
    .await?;
    let session = env.session();

    let reply = session.get("login").await?;
    assert_eq!(reply.body["to"], "/if/flow/enrollment/");

    env.client
        .delete(env.url("/api/v3/flows/instances/enrollment/"))
        .send()
        .await?;

    let reply = session.post("login", follow_redirect()).await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.component(), "ak-stage-flow-error");

    Ok(())
}

/// Tests that a duplicate redirect response after a switch replays the
/// target flow's challenge instead of planning the source flow again.
#[tokio::test]
async fn test_repeated_switch_response_is_replayed() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([
        login_with(RedirectStage::to_flow("enrollment", true)),
        enrollment(),
    ])
    .await?;
    let session = env.session();

    let reply = session.get_with("login", &[("next", "/done/")]).await?;
    let (plan_id, position) = reply.stamp();
    let stamped = json!({
        "component": "xak-flow-redirect",
        "plan_id": plan_id,
        "position": position,
    });

    let switched = session.post("login", stamped.clone()).await?;
    assert_eq!(switched.body["flow_info"]["slug"], "enrollment");

    let replayed = session.post("login", stamped).await?;
    assert_eq!(replayed.status, StatusCode::OK);
    assert_eq!(replayed.body["flow_info"]["slug"], "enrollment");
    assert_eq!(replayed.stamp(), switched.stamp());

    let reply = session
        .post("enrollment", json!({"component": "ak-stage-dummy"}))
        .await?;
    assert_eq!(reply.body["to"], "/done/");

    Ok(())
}

/// Tests that navigating to the advertised flow path performs the switch.
#[tokio::test]
async fn test_following_redirect_keeps_context() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([
        login_with(RedirectStage::to_flow("enrollment", true)),
        enrollment(),
    ])
    .await?;
    let session = env.session();

    let reply = session.get_with("login", &[("next", "/done/")]).await?;
    assert_eq!(reply.body["to"], "/if/flow/enrollment/");

    let reply = session.get("enrollment").await?;
    assert_eq!(reply.component(), "ak-stage-dummy");
    assert_eq!(reply.body["flow_info"]["slug"], "enrollment");

    let reply = session
        .post("enrollment", json!({"component": "ak-stage-dummy"}))
        .await?;
    assert_eq!(reply.component(), "xak-flow-redirect");
    assert_eq!(reply.body["to"], "/done/");

    Ok(())
}
