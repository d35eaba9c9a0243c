//! # Execution Flow
//!
//! A caller publishes on `executions.requests` and receives exactly one
//! response on `executions.response.<id>`.

#![allow(clippy::unwrap_used)]

use shared_types::ExecutionRequest;

use super::support::{config_for, start_worker, ECHO_PROMPT};

#[tokio::test]
async fn test_health_prompt_without_cwd_succeeds() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(&root, ECHO_PROMPT));

    let request = ExecutionRequest::new("Say healthy");
    let id = request.id;
    let response = worker.client().execute(request).await.unwrap();

    assert!(response.success);
    assert_eq!(response.id, id);
    assert!(response.output.to_lowercase().contains("healthy"));
    assert_eq!(response.session_id.as_deref(), Some("sess-e2e"));

    // A fresh directory was generated under the safe root.
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);

    assert!(worker.engine().health_check().await);
    worker.shutdown().await;
}

#[tokio::test]
async fn test_project_id_selects_working_directory() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(
        &root,
        r#"printf '{"type":"result","result":"%s"}\n' "$(pwd)""#,
    ));

    let response = worker
        .client()
        .execute(ExecutionRequest::new("where am i").with_project_id("proj-7"))
        .await
        .unwrap();

    assert!(response.success);
    assert!(response.output.ends_with("/proj-7"));
    assert!(root.path().join("proj-7").is_dir());
    worker.shutdown().await;
}

#[tokio::test]
async fn test_cwd_outside_safe_root_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(&root, ECHO_PROMPT));

    let response = worker
        .client()
        .execute(ExecutionRequest::new("x").with_cwd("/etc"))
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("validation"));
    assert_eq!(worker.engine().metrics().failed_requests, 1);
    worker.shutdown().await;
}

#[tokio::test]
async fn test_assistant_text_used_when_no_result_event() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(
        &root,
        r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"partial answer"}]}}'"#,
    ));

    let response = worker
        .client()
        .execute(ExecutionRequest::new("x"))
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.output, "partial answer");
    worker.shutdown().await;
}

#[tokio::test]
async fn test_non_zero_exit_reports_stderr() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(&root, "echo 'not logged in' >&2; exit 2"));

    let response = worker
        .client()
        .execute(ExecutionRequest::new("x"))
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("process_exit"));
    assert!(response.error.unwrap().contains("not logged in"));
    worker.shutdown().await;
}

#[tokio::test]
async fn test_unparseable_output_is_parse_failure() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(&root, "echo 'plain text, no events'"));

    let response = worker
        .client()
        .execute(ExecutionRequest::new("x"))
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("parse"));
    worker.shutdown().await;
}
