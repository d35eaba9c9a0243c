//! # Dispatcher
//!
//! The singleton consumer of the shared request topic.
//!
//! ## Flow
//!
//! ```text
//! executions.requests
//!       │
//!       ▼
//! ┌──────────────────────────────┐
//! │  Dispatcher                  │
//! │  - decode (reply Validation  │
//! │    if only the id survives)  │
//! │  - drop redeliveries         │
//! │  - one task per request      │
//! └──────────────────────────────┘
//!       │ spawn
//!       ▼
//! engine.execute ──→ [chunk*] ──→ end|error ──→ response
//!                    executions.stream.<id>     executions.response.<id>
//! ```
//!
//! A failing request never stops the loop. On shutdown the loop stops taking
//! requests and gives in-flight ones a bounded drain period. Requests still
//! running when it ends are aborted and answered with a `timeout` failure.
//!
//! Each accepted id sits in `pending` until exactly one party claims it:
//! the task on completion, or the drain on expiry. Only the claimant
//! publishes the end/error marker and the response.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use shared_bus::{BusMessage, DeliveryCache, MessageBus, MessageStream, TopicFilter};
use shared_types::{ipc, ExecutionError, ExecutionRequest, ExecutionResponse};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinSet};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::ExecutionEngine;
use crate::publisher::ResponsePublisher;

/// Dispatcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// How long accepted request ids are remembered for duplicate detection.
    pub dedup_window: Duration,

    /// How long in-flight executions may run on after shutdown is signalled.
    pub drain_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            dedup_window: DeliveryCache::DEFAULT_WINDOW,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// An accepted request that has not been answered yet.
struct Pending {
    stream: bool,
    abort: Option<AbortHandle>,
}

/// Consumes the request topic and runs each request through the engine.
pub struct Dispatcher {
    engine: Arc<ExecutionEngine>,
    bus: Arc<dyn MessageBus>,
    publisher: ResponsePublisher,
    delivered: Mutex<DeliveryCache>,
    pending: Mutex<HashMap<Uuid, Pending>>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<ExecutionEngine>,
        bus: Arc<dyn MessageBus>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            publisher: ResponsePublisher::new(Arc::clone(&bus)),
            engine,
            bus,
            delivered: Mutex::new(DeliveryCache::with_config(
                config.dedup_window,
                DeliveryCache::DEFAULT_GC_INTERVAL,
            )),
            pending: Mutex::new(HashMap::new()),
            config,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    /// Subscribe to the request topic.
    ///
    /// Separate from [`Dispatcher::run`] so that a caller can be sure the
    /// dispatcher is listening before publishing.
    #[must_use]
    pub fn listen(&self) -> MessageStream {
        MessageStream::new(self.bus.subscribe(TopicFilter::topic(ipc::REQUEST_TOPIC)))
    }

    /// Process requests until `shutdown` turns true or the bus goes away.
    pub async fn run(self: Arc<Self>, mut requests: MessageStream, mut shutdown: watch::Receiver<bool>) {
        info!(topic = ipc::REQUEST_TOPIC, "Dispatcher started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Dispatcher shutdown signal received");
                        break;
                    }
                }
                message = requests.next() => {
                    let Some(message) = message else {
                        warn!("Request stream closed");
                        break;
                    };
                    if let Some(request) = self.accept(&message).await {
                        let id = request.id;
                        self.pending.lock().insert(id, Pending { stream: request.stream, abort: None });
                        let dispatcher = Arc::clone(&self);
                        let abort = in_flight.spawn(async move { dispatcher.process(request).await });
                        // Absent if the task already finished and claimed it.
                        if let Some(pending) = self.pending.lock().get_mut(&id) {
                            pending.abort = Some(abort);
                        }
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(joined);
                }
            }
        }

        self.drain(in_flight).await;
        info!("Dispatcher stopped");
    }

    /// Decode and deduplicate one request message.
    async fn accept(&self, message: &BusMessage) -> Option<ExecutionRequest> {
        let request = match message.decode::<ExecutionRequest>() {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Malformed request envelope");
                self.reject_malformed(message, &e.to_string()).await;
                return None;
            }
        };

        if let Err(duplicate) = self.delivered.lock().check_and_insert(request.id) {
            warn!(request_id = %duplicate.id, "Duplicate request delivery dropped");
            return None;
        }

        debug!(request_id = %request.id, stream = request.stream, "Request accepted");
        Some(request)
    }

    /// Answer a malformed request if its id can still be read.
    async fn reject_malformed(&self, message: &BusMessage, reason: &str) {
        let Some(id) = recover_id(&message.payload) else {
            return;
        };
        if self.delivered.lock().check_and_insert(id).is_err() {
            return;
        }
        let error = ExecutionError::Validation(format!("malformed request: {reason}"));
        let response = ExecutionResponse::failure(id, &error, Duration::ZERO);
        self.publisher.publish_response(&response).await;
    }

    /// Execute one request and publish everything it produces.
    async fn process(&self, request: ExecutionRequest) {
        let sink = request
            .stream
            .then(|| self.publisher.stream_sink(request.id));

        let response = self.engine.execute(&request, sink).await;

        if self.pending.lock().remove(&request.id).is_none() {
            debug!(request_id = %request.id, "Already answered by shutdown drain");
            return;
        }
        if request.stream {
            self.publisher
                .close_stream(request.id, response.error.as_deref())
                .await;
        }
        self.publisher.publish_response(&response).await;
    }

    async fn drain(&self, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }
        info!(
            in_flight = in_flight.len(),
            drain_secs = self.config.drain_timeout.as_secs(),
            "Draining in-flight executions"
        );

        let drained =
            tokio::time::timeout(self.config.drain_timeout, join_all(&mut in_flight)).await;
        if drained.is_ok() {
            return;
        }

        let abandoned: Vec<(Uuid, Pending)> = self.pending.lock().drain().collect();
        warn!(abandoned = abandoned.len(), "Drain period elapsed, abandoning executions");
        for (_, pending) in &abandoned {
            if let Some(abort) = &pending.abort {
                abort.abort();
            }
        }
        // Aborted tasks end at once; tasks that already claimed their id
        // finish publishing.
        join_all(&mut in_flight).await;

        let error = ExecutionError::timeout("shutdown drain", self.config.drain_timeout);
        let message = error.to_string();
        for (id, pending) in abandoned {
            if pending.stream {
                self.publisher.close_stream(id, Some(&message)).await;
            }
            let response = ExecutionResponse::failure(id, &error, Duration::ZERO);
            self.publisher.publish_response(&response).await;
        }
    }
}

async fn join_all(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.join_next().await {
        log_join(joined);
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => debug!("Execution task aborted"),
        Err(e) => error!(error = %e, "Execution task failed"),
    }
}

fn recover_id(payload: &str) -> Option<Uuid> {
    let value: Value = serde_json::from_str(payload).ok()?;
    value.get("id")?.as_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::engine_with_script;
    use shared_bus::{InMemoryMessageBus, MessageBusExt};
    use shared_types::{StreamChunkEvent, StreamChunkKind};

    fn start(
        engine: ExecutionEngine,
        bus: Arc<InMemoryMessageBus>,
    ) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        start_with(engine, bus, DispatcherConfig::default())
    }

    fn start_with(
        engine: ExecutionEngine,
        bus: Arc<InMemoryMessageBus>,
        config: DispatcherConfig,
    ) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(engine), bus, config));
        let requests = dispatcher.listen();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(dispatcher.run(requests, rx));
        (tx, handle)
    }

    #[tokio::test]
    async fn test_request_gets_exactly_one_response() {
        let root = tempfile::tempdir().unwrap();
        let bus = Arc::new(InMemoryMessageBus::new());
        let (shutdown, handle) = start(
            engine_with_script(&root, r#"echo '{"type":"result","result":"ok"}'"#),
            bus.clone(),
        );

        let request = ExecutionRequest::new("x");
        let mut sub = bus.subscribe_topic(&request.response_topic());
        bus.publish_json(ipc::REQUEST_TOPIC, &request).await.unwrap();

        let response: ExecutionResponse = sub.recv().await.unwrap().decode().unwrap();
        assert!(response.success);
        assert_eq!(response.output, "ok");

        shutdown.send(true).unwrap();
        handle.await.unwrap();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_redelivered_request_runs_once() {
        let root = tempfile::tempdir().unwrap();
        let bus = Arc::new(InMemoryMessageBus::new());
        let (shutdown, handle) = start(
            engine_with_script(&root, r#"echo '{"type":"result","result":"ok"}'"#),
            bus.clone(),
        );

        let request = ExecutionRequest::new("x");
        let mut sub = bus.subscribe_topic(&request.response_topic());
        bus.publish_json(ipc::REQUEST_TOPIC, &request).await.unwrap();
        bus.publish_json(ipc::REQUEST_TOPIC, &request).await.unwrap();

        sub.recv().await.unwrap();
        shutdown.send(true).unwrap();
        handle.await.unwrap();

        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_malformed_request_with_id_gets_validation_failure() {
        let root = tempfile::tempdir().unwrap();
        let bus = Arc::new(InMemoryMessageBus::new());
        let (shutdown, handle) = start(engine_with_script(&root, "echo unused"), bus.clone());

        let id = Uuid::new_v4();
        let mut sub = bus.subscribe_topic(&ipc::response_topic(&id));
        let payload = format!(r#"{{"id":"{id}","prompt":42}}"#);
        bus.publish(BusMessage::new(ipc::REQUEST_TOPIC, payload))
            .await
            .unwrap();

        let response: ExecutionResponse = sub.recv().await.unwrap().decode().unwrap();
        assert!(!response.success);
        assert_eq!(response.error_kind.as_deref(), Some("validation"));

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_does_not_stop_the_loop() {
        let root = tempfile::tempdir().unwrap();
        let bus = Arc::new(InMemoryMessageBus::new());
        let (shutdown, handle) = start(
            engine_with_script(&root, r#"echo '{"type":"result","result":"still here"}'"#),
            bus.clone(),
        );

        bus.publish(BusMessage::new(ipc::REQUEST_TOPIC, "not json"))
            .await
            .unwrap();

        let request = ExecutionRequest::new("x");
        let mut sub = bus.subscribe_topic(&request.response_topic());
        bus.publish_json(ipc::REQUEST_TOPIC, &request).await.unwrap();

        let response: ExecutionResponse = sub.recv().await.unwrap().decode().unwrap();
        assert_eq!(response.output, "still here");

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_requests_outliving_drain_get_timeout_failure() {
        let root = tempfile::tempdir().unwrap();
        let bus = Arc::new(InMemoryMessageBus::new());
        let config = DispatcherConfig {
            drain_timeout: Duration::from_millis(200),
            ..DispatcherConfig::default()
        };
        let (shutdown, handle) = start_with(
            engine_with_script(&root, "echo started; exec sleep 5"),
            bus.clone(),
            config,
        );

        let buffered = ExecutionRequest::new("x");
        let streamed = ExecutionRequest::new("y").streaming();
        let mut buffered_sub = bus.subscribe_topic(&buffered.response_topic());
        let mut streamed_sub = bus.subscribe(TopicFilter::topics(vec![
            streamed.stream_topic(),
            streamed.response_topic(),
        ]));
        bus.publish_json(ipc::REQUEST_TOPIC, &buffered).await.unwrap();
        bus.publish_json(ipc::REQUEST_TOPIC, &streamed).await.unwrap();

        // Both are running once the streamed one has produced a line.
        let first: StreamChunkEvent = streamed_sub.recv().await.unwrap().decode().unwrap();
        assert_eq!(first.kind, StreamChunkKind::Chunk);

        let started = std::time::Instant::now();
        shutdown.send(true).unwrap();
        handle.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));

        let response: ExecutionResponse = buffered_sub.recv().await.unwrap().decode().unwrap();
        assert_eq!(response.id, buffered.id);
        assert!(!response.success);
        assert_eq!(response.error_kind.as_deref(), Some("timeout"));
        assert!(buffered_sub.try_recv().is_none());

        let marker: StreamChunkEvent = streamed_sub.recv().await.unwrap().decode().unwrap();
        assert_eq!(marker.kind, StreamChunkKind::Error);
        let message = streamed_sub.recv().await.unwrap();
        assert_eq!(message.topic, streamed.response_topic());
        let response: ExecutionResponse = message.decode().unwrap();
        assert_eq!(response.error_kind.as_deref(), Some("timeout"));
        assert!(streamed_sub.try_recv().is_none());
    }

    #[test]
    fn test_recover_id() {
        let id = Uuid::new_v4();
        assert_eq!(recover_id(&format!(r#"{{"id":"{id}"}}"#)), Some(id));
        assert_eq!(recover_id(r#"{"id":"not-a-uuid"}"#), None);
        assert_eq!(recover_id("[]"), None);
    }
}
