//! Integration tests for the ingestion pipeline.
//!
//! These tests drive the full flow with in-memory upstreams:
//! 1. Push frames arrive on a controllable stream
//! 2. The reconciler suppresses duplicates and merges deltas
//! 3. The dispatcher fans updates out to subscribers
//! 4. When the push stream dies, the poller takes over
//!
//! Time is paused so reconnect and poll intervals run instantly.

use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use livefeed::adapters::NoJitter;
use livefeed::application::{IngestionPipeline, PipelineConfig};
use livefeed::domain::connection::ConnectionState;
use livefeed::domain::foundation::{DomainError, ErrorCode};
use livefeed::domain::reconciliation::{EntityKey, EntityUpdate};
use livefeed::domain::stream::MessageSource;
use livefeed::ports::{
    EventHandler, EventSubscriber, Frame, FrameStream, PullSource, PushChannel, TransportError,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

type FrameSender = mpsc::UnboundedSender<Result<Frame, TransportError>>;

/// Push channel whose streams are fed by the test.
///
/// Each `open` consumes one prepared stream; with none left, `open` fails.
struct ControlledChannel {
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<Frame, TransportError>>>>,
    opens: AtomicUsize,
}

impl ControlledChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            streams: Mutex::new(VecDeque::new()),
            opens: AtomicUsize::new(0),
        })
    }

    fn prepare_stream(&self) -> FrameSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(rx);
        tx
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushChannel for ControlledChannel {
    async fn open(&self) -> Result<FrameStream, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let rx = self.streams.lock().unwrap().pop_front();
        match rx {
            Some(rx) => Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|frame| (frame, rx))
            }))),
            None => Err(TransportError::Connect("connection refused".to_string())),
        }
    }

    fn endpoint(&self) -> &str {
        "memory://push"
    }
}

/// Pull source returning a fixed body.
struct FixedPull {
    body: JsonValue,
    fetches: AtomicUsize,
}

impl FixedPull {
    fn new(body: JsonValue) -> Arc<Self> {
        Arc::new(Self {
            body,
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PullSource for FixedPull {
    async fn fetch(&self) -> Result<JsonValue, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }

    fn endpoint(&self) -> &str {
        "memory://pull"
    }
}

/// Records every update it receives.
#[derive(Default)]
struct RecordingHandler {
    updates: Mutex<Vec<EntityUpdate>>,
}

impl RecordingHandler {
    fn states(&self) -> Vec<JsonValue> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.state.to_json())
            .collect()
    }
}

impl EventHandler for RecordingHandler {
    fn handle(&self, update: &EntityUpdate) -> Result<(), DomainError> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RecordingHandler"
    }
}

fn data(json: JsonValue) -> Result<Frame, TransportError> {
    Ok(Frame::Data(json.to_string()))
}

fn build(push: Arc<ControlledChannel>, pull: Arc<FixedPull>) -> IngestionPipeline {
    IngestionPipeline::new(push, pull, Arc::new(NoJitter), PipelineConfig::default()).unwrap()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn duplicate_is_suppressed_and_deltas_merge() {
    let push = ControlledChannel::new();
    let frames = push.prepare_stream();
    let pipeline = build(push.clone(), FixedPull::new(json!({})));
    let recorder = Arc::new(RecordingHandler::default());
    pipeline.dispatcher().subscribe("metrics", recorder.clone());

    pipeline.start().unwrap();
    frames.send(data(json!({"id": "e1", "type": "metrics", "value": {"a": 1, "b": 2}}))).unwrap();
    frames.send(data(json!({"id": "e1", "type": "metrics", "value": {"a": 1, "b": 2}}))).unwrap();
    settle().await;

    assert_eq!(recorder.states(), vec![json!({"a": 1, "b": 2})]);
    assert_eq!(pipeline.stats().reconciler.duplicates, 1);

    frames.send(data(json!({"id": "e2", "type": "metrics", "value": {"b": 3}}))).unwrap();
    settle().await;

    assert_eq!(
        recorder.states(),
        vec![json!({"a": 1, "b": 2}), json!({"a": 1, "b": 3})]
    );
    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn poller_takes_over_when_push_dies_and_yields_when_it_returns() {
    let push = ControlledChannel::new();
    let first = push.prepare_stream();
    let pull = FixedPull::new(json!({"id": "p1", "type": "metrics", "value": {"c": 4}}));
    let pipeline = build(push.clone(), pull.clone());
    let recorder = Arc::new(RecordingHandler::default());
    pipeline.dispatcher().subscribe("metrics", recorder.clone());

    pipeline.start().unwrap();
    first.send(data(json!({"id": "e1", "type": "metrics", "value": {"a": 1}}))).unwrap();
    settle().await;
    assert!(pipeline.is_live());

    // Server closes the stream; reconnects fail until a new stream is prepared.
    drop(first);
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    assert!(!pipeline.is_live());
    assert_eq!(pull.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.states().last(), Some(&json!({"a": 1, "c": 4})));
    assert_eq!(
        recorder.updates.lock().unwrap().last().map(|u| u.source),
        Some(MessageSource::Poll)
    );

    // Repeated polls of the same message are duplicates.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(recorder.states().len(), 2);

    // Push comes back; the next reconnect attempt succeeds and polling stops.
    let second = push.prepare_stream();
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(pipeline.is_live());
    let fetches = pull.fetches.load(Ordering::SeqCst);

    second.send(data(json!({"id": "e3", "type": "metrics", "value": {"a": 2}}))).unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(pull.fetches.load(Ordering::SeqCst), fetches);
    assert_eq!(recorder.states().last(), Some(&json!({"a": 2, "c": 4})));
    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failing_subscriber_does_not_starve_others() {
    struct Exploding;

    impl EventHandler for Exploding {
        fn handle(&self, _: &EntityUpdate) -> Result<(), DomainError> {
            Err(DomainError::new(ErrorCode::HandlerFailed, "view crashed"))
        }

        fn name(&self) -> &'static str {
            "Exploding"
        }
    }

    let push = ControlledChannel::new();
    let frames = push.prepare_stream();
    let pipeline = build(push.clone(), FixedPull::new(json!({})));
    let recorder = Arc::new(RecordingHandler::default());
    pipeline.dispatcher().subscribe("session", Arc::new(Exploding));
    pipeline.dispatcher().subscribe("session", recorder.clone());

    pipeline.start().unwrap();
    frames
        .send(data(json!({"id": "s1", "type": "session", "entity": "s-1", "value": {"user": "ana"}})))
        .unwrap();
    frames
        .send(data(json!({"id": "s2", "type": "session", "entity": "s-1", "value": {"active": true}})))
        .unwrap();
    settle().await;

    assert_eq!(
        recorder.states(),
        vec![json!({"user": "ana"}), json!({"user": "ana", "active": true})]
    );
    let snapshot = pipeline
        .reconciler()
        .snapshot(&EntityKey::new("session", "s-1"))
        .unwrap();
    assert_eq!(snapshot.version, 2);
    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_and_messages_are_skipped() {
    let push = ControlledChannel::new();
    let frames = push.prepare_stream();
    let pipeline = build(push.clone(), FixedPull::new(json!({})));
    let recorder = Arc::new(RecordingHandler::default());
    pipeline.dispatcher().subscribe("metrics", recorder.clone());

    pipeline.start().unwrap();
    frames.send(Ok(Frame::Data("{truncated".to_string()))).unwrap();
    frames.send(data(json!({"id": "x", "value": {"a": 1}}))).unwrap();
    frames.send(data(json!({"id": "e1", "type": "metrics", "value": {"a": 2}}))).unwrap();
    settle().await;

    assert_eq!(recorder.states(), vec![json!({"a": 2})]);
    assert_eq!(pipeline.stats().reconciler.dropped, 1);
    assert!(pipeline.is_live());
    assert_eq!(push.opens(), 1);
    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unsubscribed_consumer_stops_receiving() {
    let push = ControlledChannel::new();
    let frames = push.prepare_stream();
    let pipeline = build(push.clone(), FixedPull::new(json!({})));
    let recorder = Arc::new(RecordingHandler::default());
    let token = pipeline.dispatcher().subscribe("metrics", recorder.clone());

    pipeline.start().unwrap();
    frames.send(data(json!({"id": "e1", "type": "metrics", "value": {"a": 1}}))).unwrap();
    settle().await;

    assert!(pipeline.dispatcher().unsubscribe(&token));
    frames.send(data(json!({"id": "e2", "type": "metrics", "value": {"a": 2}}))).unwrap();
    settle().await;

    assert_eq!(recorder.states().len(), 1);
    assert!(!pipeline.dispatcher().unsubscribe(&token));
    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_the_link() {
    let push = ControlledChannel::new();
    let _frames = push.prepare_stream();
    let pipeline = build(push.clone(), FixedPull::new(json!({})));

    pipeline.start().unwrap();
    settle().await;
    assert!(pipeline.is_live());

    pipeline.shutdown().await;

    let status = *pipeline.status().borrow();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(!status.live);
}
