use std::sync::Arc;
use std::time::Duration;

use cadence::app::App;
use cadence::config::Settings;
use cadence::executor::Outcome;
use cadence::log_buffer::{LOG_CAPACITY, Severity};
use cadence::mock::MockTransport;
use cadence::registry::LoopAction;

fn app_with(transport: Arc<MockTransport>) -> App {
    let mut settings = Settings::default();
    settings.form.video_id = "v1".into();
    App::with_transport(&settings, transport, None).expect("app")
}

#[tokio::test]
async fn video_and_user_fields_stay_independent() {
    let transport = Arc::new(MockTransport::new());
    let app = app_with(transport.clone());

    // Only the video id is set, so follow must not borrow it.
    let res = app.on_follow().await;
    assert_eq!(res.outcome, Outcome::ValidationError);
    assert_eq!(res.message, "User ID is required for following");
    assert_eq!(transport.call_count(), 0);

    app.set_user_id("u5");
    assert!(app.on_follow().await.is_success());
    assert!(app.on_like().await.is_success());
    assert!(app.on_view().await.is_success());
    assert!(app.on_test().await.is_success());
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn credentials_set_through_the_form_are_sent() {
    let transport = Arc::new(MockTransport::new());
    let app = app_with(transport.clone());
    app.set_credential("auth_token", "tok").unwrap();
    assert!(app.set_credential("password", "x").is_err());

    app.on_like().await;
    assert_eq!(
        transport.requests()[0].headers.get("Cookie"),
        Some("auth_token=tok")
    );
}

#[tokio::test]
async fn clear_leaves_exactly_the_notice() {
    let app = app_with(Arc::new(MockTransport::new()));
    app.on_like().await;
    app.on_like().await;
    app.on_clear_logs();

    let logs = app.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].severity(), Severity::Info);
    assert_eq!(logs[0].message(), "Logs cleared");
}

#[tokio::test]
async fn log_view_is_bounded() {
    let app = app_with(Arc::new(MockTransport::new()));
    for _ in 0..60 {
        app.on_like().await;
    }
    assert_eq!(app.logs().len(), LOG_CAPACITY);
}

#[tokio::test]
async fn interval_bounds_are_enforced() {
    let app = app_with(Arc::new(MockTransport::new()));
    assert!(app.set_loop_interval(0).is_err());
    assert!(app.set_loop_interval(3601).is_err());
    app.set_loop_interval(3600).unwrap();
    assert_eq!(app.loop_interval_seconds(), 3600);
}

#[tokio::test(start_paused = true)]
async fn loop_controls_follow_the_form() {
    let transport = Arc::new(MockTransport::new());
    let app = app_with(transport.clone());
    app.select_action(LoopAction::View);
    app.set_loop_interval(2).unwrap();

    assert!(!app.is_looping());
    assert!(app.on_start_loop());
    assert!(app.is_looping());
    assert!(!app.on_start_loop());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.call_count(), 2);
    assert!(transport.requests().iter().all(|r| r.path == "/api/v1/stats"));

    assert!(app.on_stop_loop());
    assert!(!app.is_looping());
    assert!(!app.on_stop_loop());

    let starts = app
        .logs()
        .iter()
        .filter(|e| e.message() == "Started loop: view every 2 seconds")
        .count();
    let stops = app
        .logs()
        .iter()
        .filter(|e| e.message() == "Loop stopped")
        .count();
    assert_eq!((starts, stops), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn single_shots_run_while_looping() {
    let transport = Arc::new(MockTransport::new().with_delay(Duration::from_secs(4)));
    let app = Arc::new(app_with(transport.clone()));
    app.on_start_loop();

    tokio::time::sleep(Duration::from_secs(6)).await;
    let res = app.on_test().await;
    assert!(res.is_success());
    // The loop call dispatched at t=5 overlapped with the manual test.
    assert_eq!(transport.max_in_flight(), 2);
    app.on_stop_loop();
}

#[tokio::test(start_paused = true)]
async fn dropping_the_app_stops_the_timer() {
    let transport = Arc::new(MockTransport::new());
    let app = app_with(transport.clone());
    app.set_loop_interval(1).unwrap();
    app.on_start_loop();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(transport.call_count(), 1);

    drop(app);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.call_count(), 1);
}

#[test]
fn app_requires_a_runtime() {
    let err = App::with_transport(&Settings::default(), Arc::new(MockTransport::new()), None)
        .err()
        .expect("no runtime");
    assert!(err.to_string().contains("runtime"));
}
