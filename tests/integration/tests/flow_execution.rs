//! Flow executor integration tests.

use ak_integration_tests::TestEnv;
use ak_model::{
    DenyStage, DummyStage, Flow, FlowDesignation, IdentificationStage, PolicyBinding, Stage,
    StageKind, UserField,
};
use ak_server::{ServerConfig, SESSION_HEADER};
use reqwest::StatusCode;
use serde_json::json;

fn identification(config: IdentificationStage) -> Stage {
    Stage::new("identification", StageKind::Identification(config))
}

fn dummy(name: &str) -> Stage {
    Stage::new(name, StageKind::Dummy(DummyStage::default()))
}

fn login_flow() -> Flow {
    Flow::new("login", FlowDesignation::Authentication)
        .with_title("Welcome")
        .with_stage(identification(IdentificationStage::default()))
        .with_stage(dummy("dummy"))
}

fn identify(uid: &str) -> serde_json::Value {
    json!({"component": "ak-stage-identification", "uid_field": uid})
}

/// Tests that stages are challenged in binding order and the flow completes.
#[tokio::test]
async fn test_stages_run_in_order() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([login_flow()]).await?;
    let session = env.session();

    let reply = session.get("login").await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.component(), "ak-stage-identification");
    assert_eq!(reply.body["flow_info"]["slug"], "login");
    assert_eq!(reply.body["flow_info"]["title"], "Welcome");
    assert_eq!(reply.session.as_deref(), Some(session.id.as_str()));

    let reply = session.post("login", identify("akadmin")).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.component(), "ak-stage-dummy");

    let reply = session
        .post("login", json!({"component": "ak-stage-dummy"}))
        .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.component(), "xak-flow-redirect");
    assert_eq!(reply.body["to"], "/");

    // A completed flow starts over.
    let reply = session.get("login").await?;
    assert_eq!(reply.component(), "ak-stage-identification");

    Ok(())
}

/// Tests that `next` becomes the completion redirect.
#[tokio::test]
async fn test_next_parameter_sets_completion_redirect() -> anyhow::Result<()> {
    let flow = Flow::new("consent", FlowDesignation::Authorization).with_stage(dummy("dummy"));
    let env = TestEnv::with_flows([flow]).await?;
    let session = env.session();

    let reply = session.get_with("consent", &[("next", "/app/")]).await?;
    assert_eq!(reply.component(), "ak-stage-dummy");

    let reply = session
        .post("consent", json!({"component": "ak-stage-dummy"}))
        .await?;
    assert_eq!(reply.body["to"], "/app/");

    Ok(())
}

/// Tests that `next` pointing at a foreign host is ignored.
#[tokio::test]
async fn test_foreign_next_is_ignored() -> anyhow::Result<()> {
    let flow = Flow::new("consent", FlowDesignation::Authorization).with_stage(dummy("dummy"));
    let env = TestEnv::with_flows([flow]).await?;
    let session = env.session();

    session
        .get_with("consent", &[("next", "https://evil.example/")])
        .await?;
    let reply = session
        .post("consent", json!({"component": "ak-stage-dummy"}))
        .await?;
    assert_eq!(reply.body["to"], "/");

    Ok(())
}

/// Tests that a session id is minted when the client sends none.
#[tokio::test]
async fn test_session_is_minted_when_absent() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([login_flow()]).await?;

    let response = env.client.get(env.executor_url("login")).send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    let session = response
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let session = session.expect("session header should be set");
    assert!(uuid::Uuid::parse_str(&session).is_ok());

    Ok(())
}

/// Tests that a rejected response is re-challenged with errors until the
/// attempt ceiling aborts the flow.
#[tokio::test]
async fn test_retry_then_abort() -> anyhow::Result<()> {
    let flow = Flow::new("email-login", FlowDesignation::Authentication)
        .with_stage(identification(IdentificationStage {
            user_fields: vec![UserField::Email],
            ..IdentificationStage::default()
        }))
        .with_stage(dummy("dummy"));
    let env = TestEnv::with_flows([flow]).await?;
    let session = env.session();
    session.get("email-login").await?;

    // The testing configuration allows three attempts.
    for _ in 0..2 {
        let reply = session.post("email-login", identify("akadmin")).await?;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.component(), "ak-stage-identification");
        assert_eq!(
            reply.body["response_errors"]["non_field_errors"][0]["string"],
            "Failed to authenticate."
        );
    }

    let reply = session.post("email-login", identify("akadmin")).await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.component(), "ak-stage-flow-error");
    assert_eq!(reply.body["error"], "Too many failed attempts.");

    // The aborted plan is gone; the flow starts over without errors.
    let reply = session.get("email-login").await?;
    assert_eq!(reply.component(), "ak-stage-identification");
    assert!(reply.body.get("response_errors").is_none());

    Ok(())
}

/// Tests that a successful response resets the attempt counter.
#[tokio::test]
async fn test_valid_response_after_retry_continues() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([login_flow()]).await?;
    let session = env.session();
    session.get("login").await?;

    let reply = session.post("login", identify("   ")).await?;
    assert_eq!(reply.component(), "ak-stage-identification");
    assert!(reply.body["response_errors"]["non_field_errors"].is_array());

    let reply = session.post("login", identify("akadmin")).await?;
    assert_eq!(reply.component(), "ak-stage-dummy");

    Ok(())
}

/// Tests that a response for the wrong component is rejected without
/// touching the plan.
#[tokio::test]
async fn test_component_mismatch_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([login_flow()]).await?;
    let session = env.session();
    session.get("login").await?;

    let reply = session
        .post("login", json!({"component": "ak-stage-dummy"}))
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "component_mismatch");

    let reply = session
        .post("login", json!({"uid_field": "akadmin"}))
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "invalid_response");

    let reply = session.get("login").await?;
    assert_eq!(reply.component(), "ak-stage-identification");

    Ok(())
}

/// Tests that a duplicate submission for an already completed stage
/// replays the current challenge instead of being dispatched again.
#[tokio::test]
async fn test_stale_response_is_replayed() -> anyhow::Result<()> {
    let flow = login_flow().with_stage(dummy("second-dummy"));
    let env = TestEnv::with_flows([flow]).await?;
    let session = env.session();

    let first = session.get("login").await?;
    let (plan_id, position) = first.stamp();
    let stamped = json!({
        "component": "ak-stage-identification",
        "uid_field": "akadmin",
        "plan_id": plan_id,
        "position": position,
    });

    let reply = session.post("login", stamped.clone()).await?;
    assert_eq!(reply.component(), "ak-stage-dummy");
    let current = reply.stamp();
    assert_ne!(current.1, position);

    // Double submit: the identification response is stale now.
    let replayed = session.post("login", stamped).await?;
    assert_eq!(replayed.status, StatusCode::OK);
    assert_eq!(replayed.component(), "ak-stage-dummy");
    assert_eq!(replayed.stamp(), current);

    let reply = session
        .post(
            "login",
            json!({
                "component": "ak-stage-dummy",
                "plan_id": current.0.clone(),
                "position": current.1.clone(),
            }),
        )
        .await?;
    assert_eq!(reply.component(), "ak-stage-dummy");
    assert_ne!(reply.stamp().1, current.1);

    Ok(())
}

/// Tests that a deny stage aborts the flow with a generic message.
#[tokio::test]
async fn test_deny_stage_aborts() -> anyhow::Result<()> {
    let flow = Flow::new("blocked", FlowDesignation::Authentication).with_stage(Stage::new(
        "deny",
        StageKind::Deny(DenyStage {
            deny_message: Some("Not today.".to_string()),
        }),
    ));
    let env = TestEnv::with_flows([flow]).await?;
    let session = env.session();

    let reply = session.get("blocked").await?;
    assert_eq!(reply.component(), "ak-stage-access-denied");
    assert_eq!(reply.body["error_message"], "Not today.");

    let reply = session
        .post("blocked", json!({"component": "ak-stage-access-denied"}))
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.component(), "ak-stage-flow-error");
    assert_eq!(reply.body["error"], "This flow could not be completed.");

    Ok(())
}

/// Tests that an unknown flow is reported as not found.
#[tokio::test]
async fn test_unknown_flow_returns_not_found() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let reply = env.session().get("missing").await?;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.component(), "ak-stage-flow-error");
    assert_eq!(reply.body["error"], "Flow does not exist.");

    Ok(())
}

/// Tests that a flow whose own policies deny the request is not planned.
#[tokio::test]
async fn test_flow_policy_denies_planning() -> anyhow::Result<()> {
    let config = ServerConfig {
        denied_policies: vec!["is-blocked".to_string()],
        ..ServerConfig::for_testing()
    };
    let env = TestEnv::with_config(config).await?;
    let flow = login_flow().with_policy(PolicyBinding::new("is-blocked"));
    assert!(env.put_flow(&flow).await?.status().is_success());

    let reply = env.session().get("login").await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Flow does not apply to current user.");

    Ok(())
}

/// Tests that cancelling drops the plan.
#[tokio::test]
async fn test_cancel_restarts_flow() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([login_flow()]).await?;
    let session = env.session();
    session.get("login").await?;

    let reply = session.post("login", identify("akadmin")).await?;
    assert_eq!(reply.component(), "ak-stage-dummy");

    assert_eq!(session.cancel("login").await?, StatusCode::NO_CONTENT);

    let reply = session.get("login").await?;
    assert_eq!(reply.component(), "ak-stage-identification");

    Ok(())
}

/// Tests that sessions do not share plans.
#[tokio::test]
async fn test_sessions_are_isolated() -> anyhow::Result<()> {
    let env = TestEnv::with_flows([login_flow()]).await?;
    let alice = env.session();
    let bob = env.session();

    alice.get("login").await?;
    bob.get("login").await?;
    alice.post("login", identify("alice")).await?;

    assert_eq!(alice.get("login").await?.component(), "ak-stage-dummy");
    assert_eq!(
        bob.get("login").await?.component(),
        "ak-stage-identification"
    );

    Ok(())
}
