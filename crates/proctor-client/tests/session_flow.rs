//! End-to-end session runs against the mock API and a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use proctor_client::mock::MockApi;
use proctor_client::{HttpApi, ProctorConfig};
use proctor_core::controller::{ControllerOptions, SessionController};
use proctor_core::runner::{NoopView, SessionRunner};
use proctor_core::timer::{SystemClock, TokioClock};

fn instant_options() -> ControllerOptions {
    ControllerOptions {
        advance_delay: Duration::ZERO,
        ..Default::default()
    }
}

async fn feed(lines: &[&str]) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);
    for line in lines {
        tx.send(line.to_string()).await.unwrap();
    }
    // Keep the sender alive so the session is not cut short by a closed input.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        drop(tx);
    });
    rx
}

#[tokio::test(start_paused = true)]
async fn mock_session_with_coding_round() {
    let api = Arc::new(MockApi::sample().with_duration(10));
    let mut runner = SessionRunner::new(
        SessionController::new(instant_options()),
        api.clone(),
        Arc::new(TokioClock::new()),
        NoopView,
    );

    let mut rx = feed(&["Ada Lovelace", "2", "2", "2", "    return sum(xs)", ":run", ":submit"]).await;
    let outcome = runner.run(&mut rx).await.unwrap();

    assert_eq!(outcome.candidate_name, "Ada Lovelace");
    assert_eq!(outcome.result.score_mcq, Some(3));
    assert_eq!(
        outcome.payload.code.as_deref(),
        Some("def total(xs):\n    return sum(xs)\n")
    );
    assert!(outcome.result.coding_result.is_some());
    assert_eq!(api.test_calls(), 1);
    assert_eq!(api.submit_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn records_result_when_enabled() {
    let api = Arc::new(MockApi::sample().with_coding(None));
    let options = ControllerOptions {
        record_results: true,
        ..instant_options()
    };
    let mut runner = SessionRunner::new(
        SessionController::new(options),
        api.clone(),
        Arc::new(TokioClock::new()),
        NoopView,
    );

    let mut rx = feed(&["Grace", "2", "1", "2", ":submit"]).await;
    let outcome = runner.run(&mut rx).await.unwrap();
    assert_eq!(outcome.result.score_mcq, Some(2));

    let recorded = api.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].name, "Grace");
    assert_eq!(recorded[0].score, Some(2));
}

#[tokio::test(start_paused = true)]
async fn failed_submit_is_reported_once() {
    let api = Arc::new(MockApi::sample().failing_submit("database down"));
    let mut runner = SessionRunner::new(
        SessionController::new(instant_options()),
        api.clone(),
        Arc::new(TokioClock::new()),
        NoopView,
    );

    let mut rx = feed(&["Ada", "1", "1", "1", ":submit", ":submit"]).await;
    let err = runner.run(&mut rx).await.unwrap_err();
    assert!(err.is_submission_failure());
    assert!(err.to_string().contains("database down"));
    assert_eq!(api.submit_calls(), 1);
}

#[tokio::test]
async fn http_session_against_wiremock() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "duration_minutes": 5,
            "total_mcq": 1,
            "has_coding": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/start"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"session_id": "s-42"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/questions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "q1", "question": "Pick B", "choices": ["A", "B"]}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/coding"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .and(body_partial_json(serde_json::json!({
            "session_id": "s-42",
            "answers": [{"qid": "q1", "choice_index": 1}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidate_name": "Ada",
            "score_mcq": 1,
            "total_mcq": 1,
            "coding_result": null,
            "submitted_at": "2026-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProctorConfig {
        api_base: server.uri(),
        advance_delay_ms: 0,
        ..Default::default()
    };
    let api: HttpApi = config.create_api().unwrap();
    let mut runner = SessionRunner::new(
        SessionController::new(config.controller_options()),
        Arc::new(api),
        Arc::new(SystemClock),
        NoopView,
    )
    .with_tick_interval(config.tick_interval());

    let mut rx = feed(&["Ada", "2", ":submit"]).await;
    let outcome = runner.run(&mut rx).await.unwrap();

    assert_eq!(outcome.session_id, "s-42");
    assert_eq!(outcome.result.score_mcq, Some(1));
    assert_eq!(
        outcome.result.extra.get("submitted_at"),
        Some(&serde_json::json!("2026-01-01T00:00:00Z"))
    );
}
