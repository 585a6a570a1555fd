
use std::time::Duration;

use axum::{body::Body, http::Request, http::StatusCode};
use hydra_worker::api::run_task;
use hydra_worker::config::ExecMode;
use hydra_worker::task::Task;
use test_harness::{
    send, submit_request, test_app, test_app_with_mode, test_state, test_worker_config,
    MockBehavior, MockCoordinator,
};

const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_allowed_command_reports_started_then_completed() {
    let coordinator = MockCoordinator::start().await;
    let app = test_app(&coordinator.url);

    let (status, body) = send(app, submit_request(r#"{"id":"t1","command":"echo hi"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], "t1");
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["exit_code"], 0);
    assert_eq!(body["output"], "hi\n");

    let updates = coordinator.wait_for_updates("t1", 2, REPORT_TIMEOUT).await;
    assert_eq!(updates, vec!["STARTED", "COMPLETED"]);
}

#[tokio::test]
async fn test_disallowed_command_is_rejected_without_reports() {
    let coordinator = MockCoordinator::start().await;
    let app = test_app(&coordinator.url);

    let (status, body) = send(app, submit_request(r#"{"id":"t2","command":"rm -rf /"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not allowed"));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(coordinator.updates().is_empty());
}

#[tokio::test]
async fn test_missing_binary_reports_started_then_failed() {
    let coordinator = MockCoordinator::start().await;
    let app = test_app(&coordinator.url);

    let (status, body) = send(
        app,
        submit_request(r#"{"id":"t3","command":"/no/such/binary"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["task_id"], "t3");
    assert_eq!(body["status"], "FAILED");
    assert!(body["error"].is_string());

    let updates = coordinator.wait_for_updates("t3", 2, REPORT_TIMEOUT).await;
    assert_eq!(updates, vec!["STARTED", "FAILED"]);
}

#[tokio::test]
async fn test_non_zero_exit_is_execution_failure() {
    let coordinator = MockCoordinator::start().await;
    let app = test_app(&coordinator.url);

    let (status, body) = send(app, submit_request(r#"{"task_id":"t4","command":"false"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["exit_code"], 1);

    let updates = coordinator.wait_for_updates("t4", 2, REPORT_TIMEOUT).await;
    assert_eq!(updates, vec!["STARTED", "FAILED"]);
}

#[tokio::test]
async fn test_integer_task_id_is_accepted() {
    let coordinator = MockCoordinator::start().await;
    let app = test_app(&coordinator.url);

    let (status, body) = send(app, submit_request(r#"{"task_id":17,"command":"true"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], "17");

    let updates = coordinator.wait_for_updates("17", 2, REPORT_TIMEOUT).await;
    assert_eq!(updates, vec!["STARTED", "COMPLETED"]);
}

#[tokio::test]
async fn test_malformed_bodies_are_rejected_without_reports() {
    let coordinator = MockCoordinator::start().await;

    let bodies = [
        "",
        "not json",
        r#"{"id":"t5"}"#,
        r#"{"command":"echo hi"}"#,
        r#"{"id":"","command":"echo hi"}"#,
        r#"{"id":"t5","command":"   "}"#,
        r#"{"id":["t5"],"command":"echo hi"}"#,
    ];

    for body in bodies {
        let (status, json) = send(test_app(&coordinator.url), submit_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(json["error"].is_string(), "body: {}", body);
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(coordinator.updates().is_empty());
}

#[tokio::test]
async fn test_missing_content_type_still_runs_task() {
    let coordinator = MockCoordinator::start().await;

    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .body(Body::from(r#"{"id":"t6","command":"echo hi"}"#))
        .unwrap();
    let (status, body) = send(test_app(&coordinator.url), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["output"], "hi\n");

    let updates = coordinator
        .wait_for_updates("t6", 2, REPORT_TIMEOUT)
        .await;
    assert_eq!(updates, vec!["STARTED", "COMPLETED"]);
}

#[tokio::test]
async fn test_wrong_method_is_bad_request() {
    let coordinator = MockCoordinator::start().await;

    for method in ["GET", "PUT", "DELETE"] {
        let request = Request::builder()
            .method(method)
            .uri("/submit")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(test_app(&coordinator.url), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "method: {}", method);
        assert_eq!(body["error"], "Method not allowed");
    }

    assert!(coordinator.updates().is_empty());
}

#[tokio::test]
async fn test_shell_mode_runs_pipelines() {
    let coordinator = MockCoordinator::start().await;
    let app = test_app_with_mode(&coordinator.url, ExecMode::Shell);

    let (status, body) = send(
        app,
        submit_request(r#"{"id":"t7","command":"echo 'a b c' | wc -w"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"].as_str().unwrap().trim(), "3");
}

#[tokio::test]
async fn test_started_is_delivered_before_terminal_even_when_slow() {
    // STARTED is held by the coordinator long after the command finishes
    let coordinator = MockCoordinator::with_behavior(MockBehavior {
        started_delay: Some(Duration::from_millis(500)),
        ..MockBehavior::default()
    })
    .await;
    let app = test_app(&coordinator.url);

    let started = std::time::Instant::now();
    let (status, _) = send(app, submit_request(r#"{"id":"t8","command":"true"}"#)).await;
    assert_eq!(status, StatusCode::OK);

    // The submitter is not held back by the slow coordinator
    assert!(started.elapsed() < Duration::from_millis(450));

    let updates = coordinator.wait_for_updates("t8", 2, REPORT_TIMEOUT).await;
    assert_eq!(updates, vec!["STARTED", "COMPLETED"]);
}

#[tokio::test]
async fn test_concurrent_tasks_each_report_in_order() {
    let coordinator = MockCoordinator::start().await;
    let config = test_worker_config(&coordinator.url, 0);
    let app = hydra_worker::api::router(test_state(&config));

    let mut handles = Vec::new();
    for i in 0..8 {
        let app = app.clone();
        let body = format!(r#"{{"id":"c{}","command":"sleep 0.2"}}"#, i);
        handles.push(tokio::spawn(async move {
            send(app, submit_request(&body)).await
        }));
    }

    let started = std::time::Instant::now();
    for handle in handles {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }
    // Eight 200ms sleeps run side by side
    assert!(started.elapsed() < Duration::from_millis(1500));

    for i in 0..8 {
        let id = format!("c{}", i);
        let updates = coordinator.wait_for_updates(&id, 2, REPORT_TIMEOUT).await;
        assert_eq!(updates, vec!["STARTED", "COMPLETED"], "task {}", id);
    }
}

#[tokio::test]
async fn test_reporting_failure_does_not_affect_response() {
    // Nothing listens on port 1
    let app = test_app("http://127.0.0.1:1");

    let (status, body) = send(app, submit_request(r#"{"id":"t9","command":"echo ok"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
}

#[tokio::test]
async fn test_coordinator_rejecting_updates_does_not_affect_response() {
    let coordinator = MockCoordinator::with_behavior(MockBehavior {
        update_status: StatusCode::INTERNAL_SERVER_ERROR,
        ..MockBehavior::default()
    })
    .await;
    let app = test_app(&coordinator.url);

    let (status, _) = send(app, submit_request(r#"{"id":"t10","command":"true"}"#)).await;
    assert_eq!(status, StatusCode::OK);

    // Both updates are still attempted, in order
    let updates = coordinator.wait_for_updates("t10", 2, REPORT_TIMEOUT).await;
    assert_eq!(updates, vec!["STARTED", "COMPLETED"]);
}

#[tokio::test]
async fn test_dropped_submitter_does_not_cancel_task() {
    // No cancellation path exists for in-flight commands: abandoning the
    // request leaves the child running and its outcome still gets reported.
    let coordinator = MockCoordinator::start().await;
    let config = test_worker_config(&coordinator.url, 0);
    let state = test_state(&config);

    let submitter = tokio::spawn(async move {
        let _ = run_task(&state, Task::new("t11", "sleep 0.3")).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    submitter.abort();

    let updates = coordinator.wait_for_updates("t11", 2, REPORT_TIMEOUT).await;
    assert_eq!(updates, vec!["STARTED", "COMPLETED"]);
}
