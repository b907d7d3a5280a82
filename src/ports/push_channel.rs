//! PushChannel port - Interface for the server-pushed event stream.
//!
//! An adapter opens one long-lived stream per call to [`PushChannel::open`]
//! and yields decoded frames until the stream ends or fails. Reconnection is
//! not the adapter's concern; the connector calls `open` again.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors raised at the transport boundary.
///
/// These never reach consumers; the connector turns them into a
/// reconnect and a `live=false` status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("stream closed by server")]
    Closed,
}

impl TransportError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Client errors other than 408/429 usually mean misconfiguration; the
    /// connector still retries them, this only steers log severity.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Status { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            TransportError::Decode(_) => false,
            _ => true,
        }
    }
}

impl From<TransportError> for DomainError {
    fn from(err: TransportError) -> Self {
        let retryable = err.is_retryable();
        DomainError::new(ErrorCode::TransportError, err.to_string())
            .with_detail("retryable", retryable.to_string())
    }
}

/// One unit read from the push stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete message body (expected to be one JSON object).
    Data(String),
    /// A message body with a transport-level id (the SSE `id` field).
    Event { id: String, data: String },
    /// Keep-alive with no content; resets the idle timer.
    Heartbeat,
}

/// Stream of frames from one open connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// Port for opening the push stream.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Opens a fresh stream. At most one stream per connector is open at a time.
    async fn open(&self) -> Result<FrameStream, TransportError>;

    /// Address shown in logs and in the `Connection` record.
    fn endpoint(&self) -> &str;
}
