//! # Streaming Flow
//!
//! Every chunk precedes the end or error marker on `executions.stream.<id>`,
//! and the marker precedes the response on `executions.response.<id>`.

#![allow(clippy::unwrap_used)]

use shared_bus::{MessageBus, TopicFilter};
use shared_types::{ExecutionRequest, ExecutionResponse, StreamChunkEvent, StreamChunkKind};

use super::support::{config_for, start_worker};

const THREE_EVENTS: &str = concat!(
    r#"echo '{"type":"system","session_id":"s-1"}'; "#,
    r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"working"}]}}'; "#,
    r#"echo '{"type":"result","result":"done"}'"#,
);

#[tokio::test]
async fn test_chunks_then_end_then_response() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(&root, THREE_EVENTS));

    let request = ExecutionRequest::new("go");
    let mut observer = worker.bus().subscribe(TopicFilter::topics(vec![
        request.stream_topic(),
        request.response_topic(),
    ]));

    let mut seen = Vec::new();
    let response = worker
        .client()
        .execute_streaming(request.clone(), |chunk| seen.push(chunk))
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.output, "done");
    assert_eq!(response.session_id.as_deref(), Some("s-1"));

    let kinds: Vec<StreamChunkKind> = seen.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            StreamChunkKind::Chunk,
            StreamChunkKind::Chunk,
            StreamChunkKind::Chunk,
            StreamChunkKind::End
        ]
    );
    assert!(seen[0].data.contains("\"system\""));
    assert!(seen[2].data.contains("\"result\""));

    // Same order on the wire: four stream messages, then the response.
    for _ in 0..4 {
        let message = observer.recv().await.unwrap();
        assert_eq!(message.topic, request.stream_topic());
    }
    let last = observer.recv().await.unwrap();
    assert_eq!(last.topic, request.response_topic());
    let decoded: ExecutionResponse = last.decode().unwrap();
    assert_eq!(decoded.id, request.id);

    worker.shutdown().await;
}

#[tokio::test]
async fn test_failed_stream_ends_with_error_marker() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(
        &root,
        r#"echo '{"type":"assistant","text":"half"}'; echo 'quota exceeded' >&2; exit 4"#,
    ));

    let mut seen: Vec<StreamChunkEvent> = Vec::new();
    let response = worker
        .client()
        .execute_streaming(ExecutionRequest::new("go"), |chunk| seen.push(chunk))
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].kind, StreamChunkKind::Chunk);
    assert_eq!(seen[1].kind, StreamChunkKind::Error);
    assert!(seen[1].data.contains("quota exceeded"));
    assert_eq!(response.error.as_deref(), Some(seen[1].data.as_str()));

    worker.shutdown().await;
}

#[tokio::test]
async fn test_non_streaming_request_publishes_no_chunks() {
    let root = tempfile::tempdir().unwrap();
    let worker = start_worker(config_for(&root, THREE_EVENTS));

    let request = ExecutionRequest::new("go");
    let mut stream = worker
        .bus()
        .subscribe(TopicFilter::topic(request.stream_topic()));

    let response = worker.client().execute(request).await.unwrap();
    assert!(response.success);

    worker.shutdown().await;
    assert!(stream.try_recv().is_none());
}
