//! Integration tests for the HTTP adapters against a local axum server.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use secrecy::Secret;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use livefeed::adapters::{
    Framing, HttpPullConfig, HttpPullSource, HttpPushChannel, HttpPushConfig, NoJitter,
};
use livefeed::application::{ConnectorConfig, IngestionPipeline, PipelineConfig};
use livefeed::domain::connection::BackoffPolicy;
use livefeed::ports::{Frame, PullSource, PushChannel, TransportError};

const TOKEN: &str = "test-token";

const SSE_BODY: &str = concat!(
    ": connected\n\n",
    "event: update\n",
    "data: {\"id\":\"e1\",\"type\":\"metrics\",\"value\":{\"a\":1,\"b\":2}}\n\n",
    "data: {\"id\":\"e1\",\"type\":\"metrics\",\"value\":{\"a\":1,\"b\":2}}\n\n",
    "data: {\"id\":\"e2\",\"type\":\"metrics\",\"value\":{\"b\":3}}\n\n",
);

const NDJSON_BODY: &str = concat!(
    "{\"id\":\"n1\",\"type\":\"session\",\"entity\":\"s-1\",\"value\":{\"user\":\"ana\"}}\n",
    "\n",
    "{\"id\":\"n2\",\"type\":\"session\",\"entity\":\"s-1\",\"value\":{\"active\":true}}\n",
);

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

async fn sse(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    }
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if accept != "text/event-stream" {
        return (StatusCode::NOT_ACCEPTABLE, "want SSE").into_response();
    }
    ([(header::CONTENT_TYPE, "text/event-stream")], SSE_BODY).into_response()
}

async fn ndjson() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/x-ndjson")], NDJSON_BODY)
}

async fn latest() -> impl IntoResponse {
    Json(json!([
        {"id": "p1", "type": "metrics", "value": {"c": 1}},
        {"id": "p2", "type": "metrics", "value": {"c": 2}},
    ]))
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/events", get(sse))
        .route("/ndjson", get(ndjson))
        .route("/latest", get(latest))
        .route("/broken", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn push_channel(addr: SocketAddr, path: &str, framing: Framing) -> HttpPushChannel {
    HttpPushChannel::new(
        HttpPushConfig::new(format!("http://{}{}", addr, path))
            .with_framing(framing)
            .with_auth_token(Secret::new(TOKEN.to_string())),
    )
    .unwrap()
}

#[tokio::test]
async fn sse_stream_is_decoded_into_frames() {
    let addr = spawn_server().await;
    let channel = push_channel(addr, "/events", Framing::Sse);

    let frames: Vec<_> = channel.open().await.unwrap().collect().await;

    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0], Ok(Frame::Heartbeat));
    assert!(matches!(&frames[1], Ok(Frame::Data(d)) if d.contains("\"e1\"")));
    assert!(matches!(&frames[3], Ok(Frame::Data(d)) if d.contains("\"e2\"")));
}

#[tokio::test]
async fn ndjson_stream_is_decoded_into_frames() {
    let addr = spawn_server().await;
    let channel = push_channel(addr, "/ndjson", Framing::Ndjson);

    let frames: Vec<_> = channel.open().await.unwrap().collect().await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1], Ok(Frame::Heartbeat));
}

#[tokio::test]
async fn missing_token_is_rejected_with_status() {
    let addr = spawn_server().await;
    let channel =
        HttpPushChannel::new(HttpPushConfig::new(format!("http://{}/events", addr))).unwrap();

    let err = match channel.open().await {
        Err(e) => e,
        Ok(_) => panic!("expected 401"),
    };

    assert!(matches!(err, TransportError::Status { status: 401, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unreachable_host_is_a_connect_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let channel = push_channel(addr, "/events", Framing::Sse);

    let err = match channel.open().await {
        Err(e) => e,
        Ok(_) => panic!("expected connection failure"),
    };

    assert!(err.is_retryable());
}

#[tokio::test]
async fn pull_source_returns_json_body() {
    let addr = spawn_server().await;
    let source = HttpPullSource::new(HttpPullConfig::new(format!("http://{}/latest", addr))).unwrap();

    let body = source.fetch().await.unwrap();

    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert_eq!(body[0]["id"], "p1");
}

#[tokio::test]
async fn pull_source_reports_server_errors() {
    let addr = spawn_server().await;
    let source = HttpPullSource::new(HttpPullConfig::new(format!("http://{}/broken", addr))).unwrap();

    let err = source.fetch().await.unwrap_err();

    assert_eq!(
        err,
        TransportError::Status {
            status: 503,
            body: "down".to_string()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn pipeline_over_http_reconciles_and_dedupes_replays() {
    let addr = spawn_server().await;
    let push = Arc::new(push_channel(addr, "/events", Framing::Sse));
    let pull = Arc::new(
        HttpPullSource::new(HttpPullConfig::new(format!("http://{}/latest", addr))).unwrap(),
    );
    let config = PipelineConfig {
        connector: ConnectorConfig::default()
            .with_backoff(BackoffPolicy::fixed(Duration::from_millis(100))),
        ..PipelineConfig::default()
    };
    let pipeline = IngestionPipeline::new(push, pull, Arc::new(NoJitter), config).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    pipeline.dispatcher().subscribe_fn("metrics", "Recorder", move |update| {
        sink.lock().unwrap().push(update.state.to_json());
        Ok(())
    });

    pipeline.start().unwrap();
    // The body ends after three events, so the connector reconnects and the
    // server replays e1/e2; every replay is a duplicate.
    tokio::time::sleep(Duration::from_millis(800)).await;
    pipeline.shutdown().await;

    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec![json!({"a": 1, "b": 2}), json!({"a": 1, "b": 3})]);
    let stats = pipeline.stats();
    assert!(stats.reconciler.duplicates >= 1);
    assert_eq!(stats.reconciler.accepted, 2);
}
