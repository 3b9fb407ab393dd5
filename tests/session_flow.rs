// tests/session_flow.rs
//
// Full candidate journey through the router: intake → connecting → live
// → stop → result polling → report → reset. Uses the mock assistant's
// terminal fixture so polling resolves on the first attempt.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::Request,
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _;

use prequal_screener::api::{self, AppState};
use prequal_screener::assistant::{DynAssistantClient, MockAssistant};
use prequal_screener::poller::ResultPoller;
use prequal_screener::session::SessionHandle;

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router(mock: Arc<MockAssistant>) -> Router {
    let assistant: DynAssistantClient = mock;
    let state = AppState {
        assistant,
        session: SessionHandle::new(),
        poller: Arc::new(ResultPoller::new()),
        poll_interval: Duration::from_millis(100),
    };
    api::router(state)
}

async fn send(app: &Router, method: &str, uri: &str, payload: Option<Json>) -> Json {
    let builder = Request::builder().method(method).uri(uri);
    let req = match payload {
        Some(p) => builder
            .header("content-type", "application/json")
            .body(Body::from(p.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("json body")
}

async fn wait_for_phase(app: &Router, phase: &str) -> Json {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = send(app, "GET", "/session", None).await;
            if snapshot["phase"] == json!(phase) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("session never reached phase {phase}"))
}

#[tokio::test(start_paused = true)]
async fn candidate_journey_start_to_report_and_reset() {
    let mock = Arc::new(MockAssistant::with_terminal_fixture());
    let app = test_router(mock.clone());

    // Intake.
    let started = send(
        &app,
        "POST",
        "/session/start",
        Some(json!({
            "first_name": "Aarav",
            "last_name": "Patel",
            "email": "aarav@example.com",
            "phone": "+91 99887 66554"
        })),
    )
    .await;
    assert_eq!(started["id"], json!("mock-call-1"));

    let snapshot = send(&app, "GET", "/session", None).await;
    assert_eq!(snapshot["phase"], json!("connecting"));

    // Assistant lifecycle notifications.
    let snapshot = send(
        &app,
        "POST",
        "/session/event",
        Some(json!({ "type": "call-start" })),
    )
    .await;
    assert_eq!(snapshot["phase"], json!("live"));

    let snapshot = send(
        &app,
        "POST",
        "/session/event",
        Some(json!({ "type": "speech-start" })),
    )
    .await;
    assert_eq!(snapshot["assistant_speaking"], json!(true));

    let snapshot = send(
        &app,
        "POST",
        "/session/event",
        Some(json!({ "type": "volume-level", "level": 0.8 })),
    )
    .await;
    assert!((snapshot["volume_level"].as_f64().unwrap() - 0.8).abs() < 1e-6);

    // Candidate ends the interview; the poller takes over.
    let snapshot = send(&app, "POST", "/session/stop", None).await;
    assert_eq!(snapshot["phase"], json!("fetching_result"));

    let snapshot = wait_for_phase(&app, "result_ready").await;
    assert_eq!(snapshot["call_id"], json!("mock-call-1"));
    assert_eq!(mock.detail_requests(), 1, "fixture resolves on first poll");

    // Report served from the stored terminal result: no extra fetch.
    let report = send(&app, "GET", "/report?call_id=mock-call-1", None).await;
    assert_eq!(report["qualification"], json!("qualified"));
    assert_eq!(report["has_score_data"], json!(true));
    assert_eq!(
        report["session_meta"]["duration"],
        json!("7.5 mins"),
        "450 seconds renders with one decimal"
    );
    assert_eq!(mock.detail_requests(), 1);

    // Reset returns to the intake form with a clean slate.
    let snapshot = send(&app, "POST", "/session/reset", None).await;
    assert_eq!(snapshot["phase"], json!("idle"));
    assert!(snapshot.get("result").is_none());
    assert!(snapshot.get("call_id").is_none());
}

#[tokio::test(start_paused = true)]
async fn repeated_stop_does_not_restart_polling() {
    // A queue that never turns terminal keeps the poller alive.
    let mock = Arc::new(MockAssistant::with_responses(vec![json!({})]));
    let app = test_router(mock.clone());

    send(
        &app,
        "POST",
        "/session/start",
        Some(json!({
            "first_name": "Aarav",
            "last_name": "Patel",
            "email": "aarav@example.com",
            "phone": "+91 99887 66554"
        })),
    )
    .await;
    send(
        &app,
        "POST",
        "/session/event",
        Some(json!({ "type": "call-start" })),
    )
    .await;

    send(&app, "POST", "/session/stop", None).await;
    // A second stop while already fetching must not spawn a second task
    // (which would double the request rate).
    send(&app, "POST", "/session/stop", None).await;

    // Under the paused clock the cadence is exact: ticks at 0, 100, 200,
    // and 300ms. A doubled loop would show ~8 requests here.
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(mock.detail_requests(), 4);

    send(&app, "POST", "/session/reset", None).await;
    let settled = mock.detail_requests();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(mock.detail_requests(), settled, "reset stops polling");
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_surfaces_error_state_until_reset() {
    let mock = Arc::new(MockAssistant::failing());
    let app = test_router(mock.clone());

    send(
        &app,
        "POST",
        "/session/start",
        Some(json!({
            "first_name": "Aarav",
            "last_name": "Patel",
            "email": "aarav@example.com",
            "phone": "+91 99887 66554"
        })),
    )
    .await;
    send(
        &app,
        "POST",
        "/session/event",
        Some(json!({ "type": "call-start" })),
    )
    .await;
    send(
        &app,
        "POST",
        "/session/event",
        Some(json!({ "type": "call-end" })),
    )
    .await;

    let snapshot = wait_for_phase(&app, "error").await;
    assert!(snapshot["error"].as_str().unwrap().contains("mock transport"));

    let snapshot = send(&app, "POST", "/session/reset", None).await;
    assert_eq!(snapshot["phase"], json!("idle"));
}
