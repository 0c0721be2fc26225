use std::sync::Arc;

use serde_json::json;

use cadence::executor::{ActionExecutor, Outcome};
use cadence::headers::{ClientIdentity, Credentials};
use cadence::log_buffer::{LogBuffer, Severity};
use cadence::mock::{MockReply, MockTransport};
use cadence::registry::{ActionRegistry, ActionTag};

fn executor(transport: Arc<MockTransport>) -> (ActionExecutor, LogBuffer) {
    let logs = LogBuffer::new();
    let exec = ActionExecutor::new(
        ActionRegistry::default(),
        ClientIdentity::default(),
        transport,
        logs.clone(),
    );
    (exec, logs)
}

fn creds() -> Credentials {
    Credentials {
        session_id: "s1".into(),
        csrf_token: "c1".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn empty_target_fails_fast_without_network() {
    let transport = Arc::new(MockTransport::new());
    let (exec, logs) = executor(transport.clone());

    let res = exec.execute(ActionTag::Like, "", &creds()).await;
    assert_eq!(res.outcome, Outcome::ValidationError);
    assert_eq!(transport.call_count(), 0);

    let snap = logs.snapshot();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[0].severity(), Severity::Error);
    assert_eq!(snap[0].message(), "Video ID is required for liking");
}

#[tokio::test]
async fn successful_like_logs_attempt_then_success_with_payload() {
    let transport = Arc::new(MockTransport::new());
    let (exec, logs) = executor(transport.clone());

    let res = exec.execute(ActionTag::Like, "12345", &creds()).await;
    assert_eq!(res.outcome, Outcome::Success);

    let snap = logs.snapshot();
    assert_eq!(snap.len(), 2);
    // Newest first.
    assert_eq!(snap[1].severity(), Severity::Info);
    assert_eq!(snap[1].message(), "Attempting to like video: 12345");
    assert_eq!(snap[0].severity(), Severity::Success);
    assert_eq!(snap[0].message(), "Successfully liked video 12345");
    assert_eq!(snap[0].raw_response(), Some(&json!({ "status_code": 0 })));

    let sent = transport.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].path, "/api/v1/like");
    assert_eq!(
        sent[0].headers.get("Cookie"),
        Some("session_id=s1; csrf_token=c1")
    );
    assert_eq!(
        sent[0].body,
        Some(json!({ "targetId": "12345", "directionFlag": 1, "channel": 3 }))
    );
}

#[tokio::test]
async fn connection_error_is_an_error_entry() {
    let transport = Arc::new(
        MockTransport::new().with_default(MockReply::fail("connection refused (os error 111)")),
    );
    let (exec, logs) = executor(transport);

    let res = exec.execute(ActionTag::Like, "12345", &creds()).await;
    assert_eq!(res.outcome, Outcome::NetworkError);

    let snap = logs.snapshot();
    assert_eq!(snap.len(), 2);
    assert_eq!(snap[0].severity(), Severity::Error);
    assert!(snap[0].message().starts_with("Network error while liking video"));
    assert!(snap[0].message().contains("connection refused"));
}

#[tokio::test]
async fn nonzero_status_code_is_a_service_failure() {
    let transport = Arc::new(MockTransport::new().with_reply(
        "/api/v1/stats",
        MockReply::ok(json!({ "status_code": 2053, "status_msg": "too many plays" })),
    ));
    let (exec, logs) = executor(transport);

    let res = exec.execute(ActionTag::View, "9", &creds()).await;
    assert_eq!(res.outcome, Outcome::Failure);
    assert_eq!(res.severity, Severity::Error);
    assert_eq!(logs.snapshot()[0].message(), "Failed to register view: too many plays");
}

#[tokio::test]
async fn zero_status_code_on_error_status_is_still_a_failure() {
    let transport = Arc::new(
        MockTransport::new().with_default(MockReply::status(503, json!({ "status_code": 0 }))),
    );
    let (exec, _logs) = executor(transport);
    let res = exec.execute(ActionTag::Follow, "u1", &creds()).await;
    assert_eq!(res.outcome, Outcome::Failure);
    assert_eq!(res.message, "Failed to follow user: Unknown error");
}

#[tokio::test]
async fn test_action_needs_no_target_and_warns_on_non_2xx() {
    let transport = Arc::new(
        MockTransport::new().with_default(MockReply::status(403, json!({ "status_msg": "denied" }))),
    );
    let (exec, logs) = executor(transport.clone());

    let res = exec.execute(ActionTag::Test, "", &Credentials::default()).await;
    assert_eq!(res.outcome, Outcome::Failure);
    assert_eq!(transport.call_count(), 1);
    assert!(transport.requests()[0].body.is_none());

    let snap = logs.snapshot();
    assert_eq!(snap[1].message(), "Testing API connection...");
    assert_eq!(snap[0].severity(), Severity::Warning);
    assert_eq!(snap[0].message(), "API test returned status 403");
}

#[tokio::test]
async fn test_action_succeeds_on_2xx_regardless_of_body() {
    let transport =
        Arc::new(MockTransport::new().with_default(MockReply::ok(json!({ "status_code": 7 }))));
    let (exec, logs) = executor(transport);
    let res = exec.execute(ActionTag::Test, "", &Credentials::default()).await;
    assert!(res.is_success());
    assert_eq!(
        logs.snapshot()[0].message(),
        "API test successful - Connection established"
    );
}

#[tokio::test]
async fn follow_sends_the_user_id_field() {
    let transport = Arc::new(MockTransport::new());
    let (exec, logs) = executor(transport.clone());
    exec.execute(ActionTag::Follow, "user-77", &creds()).await;
    assert_eq!(
        transport.requests()[0].body,
        Some(json!({ "userId": "user-77", "directionFlag": 1, "from": 19 }))
    );
    assert_eq!(logs.snapshot()[0].message(), "Successfully followed user user-77");
}

#[tokio::test]
async fn every_dispatched_attempt_logs_exactly_two_entries() {
    let transport = Arc::new(MockTransport::new().with_reply(
        "/api/v1/like",
        MockReply::fail("dns error"),
    ));
    let (exec, logs) = executor(transport);
    for tag in ActionTag::ALL {
        let before = logs.len();
        exec.execute(tag, "t", &creds()).await;
        assert_eq!(logs.len() - before, 2, "{tag}");
    }
}
