//! # Execution Client
//!
//! Caller side of the request/response protocol. Subscribes to the private
//! topics before publishing so that nothing the dispatcher emits is missed.

use std::sync::Arc;
use std::time::Duration;

use shared_bus::{MessageBus, MessageBusExt, Subscription, TopicFilter};
use shared_types::{ipc, ExecutionError, ExecutionRequest, ExecutionResponse, StreamChunkEvent};
use tracing::{debug, warn};

/// Default time a caller waits for a response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Sends requests over the bus and waits for their responses.
#[derive(Clone)]
pub struct ExecutionClient {
    bus: Arc<dyn MessageBus>,
    request_timeout: Duration,
}

impl ExecutionClient {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            bus,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Publish `request` and wait for its response.
    ///
    /// # Errors
    ///
    /// - `Timeout` if no response arrives within the request timeout. The
    ///   subscription is dropped; a late response is discarded by the bus.
    /// - `Bus` if publishing fails or the bus closes while waiting.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<ExecutionResponse, ExecutionError> {
        self.send(request, |_| {}).await
    }

    /// Like [`ExecutionClient::execute`], but handing each stream message to
    /// `on_chunk` as it arrives. Forces `stream` on.
    ///
    /// All chunks and the end/error marker are delivered before the response
    /// is returned.
    ///
    /// # Errors
    ///
    /// As for [`ExecutionClient::execute`].
    pub async fn execute_streaming<F>(
        &self,
        request: ExecutionRequest,
        on_chunk: F,
    ) -> Result<ExecutionResponse, ExecutionError>
    where
        F: FnMut(StreamChunkEvent),
    {
        self.send(request.streaming(), on_chunk).await
    }

    async fn send<F>(
        &self,
        request: ExecutionRequest,
        on_chunk: F,
    ) -> Result<ExecutionResponse, ExecutionError>
    where
        F: FnMut(StreamChunkEvent),
    {
        let id = request.id;
        let response_topic = ipc::response_topic(&id);

        let mut topics = vec![response_topic.clone()];
        if request.stream {
            topics.push(ipc::stream_topic(&id));
        }
        let subscription = self.bus.subscribe(TopicFilter::topics(topics));

        self.bus.publish_json(ipc::REQUEST_TOPIC, &request).await?;
        debug!(request_id = %id, stream = request.stream, "Request published");

        let waited = tokio::time::timeout(
            self.request_timeout,
            wait_for_response(subscription, &response_topic, on_chunk),
        )
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    request_id = %id,
                    timeout_secs = self.request_timeout.as_secs(),
                    "No response before timeout"
                );
                Err(ExecutionError::timeout("execution request", self.request_timeout))
            }
        }
    }
}

async fn wait_for_response<F>(
    mut subscription: Subscription,
    response_topic: &str,
    mut on_chunk: F,
) -> Result<ExecutionResponse, ExecutionError>
where
    F: FnMut(StreamChunkEvent),
{
    loop {
        let message = subscription
            .recv()
            .await
            .ok_or_else(|| ExecutionError::Bus("bus closed while waiting for response".into()))?;

        if message.topic == response_topic {
            subscription.unsubscribe();
            return message.decode().map_err(ExecutionError::from);
        }

        match message.decode::<StreamChunkEvent>() {
            Ok(chunk) => on_chunk(chunk),
            Err(e) => warn!(topic = %message.topic, error = %e, "Undecodable stream message"),
        }
    }
}
