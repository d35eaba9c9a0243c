//! # Resilience
//!
//! Circuit breaker, slot limit, caller timeouts, redelivery, malformed
//! envelopes and graceful shutdown, all observed from the bus.

#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::time::{Duration, Instant};

use shared_bus::{BusMessage, MessageBus, MessageBusExt};
use shared_types::{ipc, ExecutionRequest, ExecutionResponse};
use uuid::Uuid;

use super::support::{config_for, start_worker, wait_until};

/// Fake tool that appends a line to `$AW_TEST_COUNTER` every time it runs.
const COUNTING: &str = concat!(
    r#"echo run >> "$AW_TEST_COUNTER"; "#,
    r#"echo '{"type":"result","result":"counted"}'"#,
);

const COUNTING_FAILURE: &str = r#"echo run >> "$AW_TEST_COUNTER"; exit 3"#;

fn runs(counter: &Path) -> usize {
    std::fs::read_to_string(counter)
        .map(|text| text.lines().count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_circuit_opens_and_rejects_without_spawning() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let counter = scratch.path().join("runs");

    let mut config = config_for(&root, COUNTING_FAILURE);
    config.gate.failure_threshold = 2;
    config
        .runner
        .env
        .push(("AW_TEST_COUNTER".to_string(), counter.display().to_string()));
    let worker = start_worker(config);
    let client = worker.client();

    for _ in 0..2 {
        let response = client.execute(ExecutionRequest::new("x")).await.unwrap();
        assert_eq!(response.error_kind.as_deref(), Some("process_exit"));
    }
    assert!(worker.engine().gate().circuit_state().is_open());

    let rejected = client.execute(ExecutionRequest::new("x")).await.unwrap();
    assert!(!rejected.success);
    assert_eq!(rejected.error_kind.as_deref(), Some("circuit_open"));
    assert_eq!(runs(&counter), 2);

    let metrics = worker.engine().metrics();
    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.failed_requests, 3);
    worker.shutdown().await;
}

#[tokio::test]
async fn test_single_slot_serialises_executions() {
    let root = tempfile::tempdir().unwrap();
    let mut config = config_for(
        &root,
        r#"sleep 0.3; echo '{"type":"result","result":"ok"}'"#,
    );
    config.gate.max_concurrency = 1;
    let worker = start_worker(config);
    let client = worker.client();

    let started = Instant::now();
    let (first, second) = tokio::join!(
        client.execute(ExecutionRequest::new("a")),
        client.execute(ExecutionRequest::new("b")),
    );

    assert!(first.unwrap().success);
    assert!(second.unwrap().success);
    assert!(started.elapsed() >= Duration::from_millis(600));
    worker.shutdown().await;
}

#[tokio::test]
async fn test_client_times_out_and_late_response_is_dropped() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(
        &root,
        r#"sleep 1; echo '{"type":"result","result":"late"}'"#,
    ));

    let err = worker
        .client()
        .with_request_timeout(Duration::from_millis(200))
        .execute(ExecutionRequest::new("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "timeout");

    // The dispatcher still finishes the execution and publishes into the void.
    worker.shutdown().await;
    assert_eq!(worker.engine().metrics().successful_requests, 1);
}

#[tokio::test]
async fn test_redelivered_request_executes_once() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let counter = scratch.path().join("runs");

    let mut config = config_for(&root, COUNTING);
    config
        .runner
        .env
        .push(("AW_TEST_COUNTER".to_string(), counter.display().to_string()));
    let worker = start_worker(config);

    let request = ExecutionRequest::new("once");
    let mut responses = worker.bus().subscribe_topic(&request.response_topic());
    worker
        .bus()
        .publish_json(ipc::REQUEST_TOPIC, &request)
        .await
        .unwrap();
    worker
        .bus()
        .publish_json(ipc::REQUEST_TOPIC, &request)
        .await
        .unwrap();

    let response: ExecutionResponse = responses.recv().await.unwrap().decode().unwrap();
    assert_eq!(response.output, "counted");

    worker.shutdown().await;
    assert!(responses.try_recv().is_none());
    assert_eq!(runs(&counter), 1);
}

#[tokio::test]
async fn test_malformed_envelope_answered_and_loop_survives() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(
        &root,
        r#"echo '{"type":"result","result":"fine"}'"#,
    ));

    let id = Uuid::new_v4();
    let mut rejected = worker.bus().subscribe_topic(&ipc::response_topic(&id));
    worker
        .bus()
        .publish(BusMessage::new(
            ipc::REQUEST_TOPIC,
            format!(r#"{{"id":"{id}","stream":"yes"}}"#),
        ))
        .await
        .unwrap();
    worker
        .bus()
        .publish(BusMessage::new(ipc::REQUEST_TOPIC, "}{"))
        .await
        .unwrap();

    let response: ExecutionResponse = rejected.recv().await.unwrap().decode().unwrap();
    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("validation"));

    let after = worker
        .client()
        .execute(ExecutionRequest::new("x"))
        .await
        .unwrap();
    assert_eq!(after.output, "fine");
    worker.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_execution() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(
        &root,
        r#"sleep 0.5; echo '{"type":"result","result":"drained"}'"#,
    ));

    let request = ExecutionRequest::new("x");
    let mut responses = worker.bus().subscribe_topic(&request.response_topic());
    worker
        .bus()
        .publish_json(ipc::REQUEST_TOPIC, &request)
        .await
        .unwrap();

    assert!(wait_until(|| worker.engine().gate().active() == 1).await);
    worker.shutdown().await;

    let response: ExecutionResponse = responses.try_recv().unwrap().decode().unwrap();
    assert_eq!(response.output, "drained");
}
