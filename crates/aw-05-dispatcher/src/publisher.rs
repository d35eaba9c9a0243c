//! # Response Publisher
//!
//! Emits a request's stream messages and its single terminal response.
//!
//! A publish failure here can only be logged: the bus is the channel back to
//! the caller, and it is the thing that failed.

use std::sync::Arc;

use async_trait::async_trait;
use aw_02_process_runner::LineSink;
use shared_bus::{MessageBus, MessageBusExt};
use shared_types::{ipc, ExecutionError, ExecutionResponse, StreamChunkEvent};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Publishes on the private topics of requests.
#[derive(Clone)]
pub struct ResponsePublisher {
    bus: Arc<dyn MessageBus>,
}

impl ResponsePublisher {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    /// Publish the terminal response for `response.id`.
    pub async fn publish_response(&self, response: &ExecutionResponse) {
        let topic = ipc::response_topic(&response.id);
        match self.bus.publish_json(&topic, response).await {
            Ok(0) => debug!(request_id = %response.id, "Response published with no subscriber"),
            Ok(_) => debug!(request_id = %response.id, success = response.success, "Response published"),
            Err(e) => error!(request_id = %response.id, error = %e, "Failed to publish response"),
        }
    }

    /// Publish one stream message.
    ///
    /// # Errors
    ///
    /// `Bus` if the message could not be published.
    pub async fn publish_stream(&self, event: &StreamChunkEvent) -> Result<(), ExecutionError> {
        let topic = ipc::stream_topic(&event.id);
        self.bus.publish_json(&topic, event).await?;
        Ok(())
    }

    /// Publish the end-of-stream or error marker that closes a stream.
    pub async fn close_stream(&self, id: Uuid, error: Option<&str>) {
        let marker = match error {
            Some(message) => StreamChunkEvent::error(id, message),
            None => StreamChunkEvent::end(id),
        };
        if let Err(e) = self.publish_stream(&marker).await {
            warn!(request_id = %id, error = %e, "Failed to publish stream marker");
        }
    }

    /// A line sink that forwards output lines as chunks of request `id`.
    #[must_use]
    pub fn stream_sink(&self, id: Uuid) -> Arc<dyn LineSink> {
        Arc::new(StreamChunkSink {
            id,
            publisher: self.clone(),
        })
    }
}

struct StreamChunkSink {
    id: Uuid,
    publisher: ResponsePublisher,
}

#[async_trait]
impl LineSink for StreamChunkSink {
    async fn on_line(&self, line: String) -> Result<(), ExecutionError> {
        self.publisher
            .publish_stream(&StreamChunkEvent::chunk(self.id, line))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::InMemoryMessageBus;
    use shared_types::StreamChunkKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sink_publishes_chunks_on_stream_topic() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let publisher = ResponsePublisher::new(bus.clone());
        let id = Uuid::new_v4();
        let mut sub = bus.subscribe_topic(&ipc::stream_topic(&id));

        let sink = publisher.stream_sink(id);
        sink.on_line("first".to_string()).await.unwrap();
        publisher.close_stream(id, None).await;

        let chunk: StreamChunkEvent = sub.recv().await.unwrap().decode().unwrap();
        assert_eq!(chunk, StreamChunkEvent::chunk(id, "first"));
        let end: StreamChunkEvent = sub.recv().await.unwrap().decode().unwrap();
        assert_eq!(end.kind, StreamChunkKind::End);
    }

    #[tokio::test]
    async fn test_error_marker_carries_message() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let publisher = ResponsePublisher::new(bus.clone());
        let id = Uuid::new_v4();
        let mut sub = bus.subscribe_topic(&ipc::stream_topic(&id));

        publisher.close_stream(id, Some("boom")).await;

        let marker: StreamChunkEvent = sub.recv().await.unwrap().decode().unwrap();
        assert_eq!(marker.kind, StreamChunkKind::Error);
        assert_eq!(marker.data, "boom");
    }

    #[tokio::test]
    async fn test_closed_bus_fails_sink_but_not_response() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let publisher = ResponsePublisher::new(bus.clone());
        bus.close();

        let sink = publisher.stream_sink(Uuid::new_v4());
        let err = sink.on_line("x".to_string()).await.unwrap_err();
        assert_eq!(err.kind(), "bus");

        // Logged only.
        let response = ExecutionResponse::failure(
            Uuid::new_v4(),
            &ExecutionError::EmptyOutput,
            Duration::ZERO,
        );
        publisher.publish_response(&response).await;
    }
}
