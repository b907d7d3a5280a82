//! TransportConnector - Keeps one push stream open and recovers from failure.
//!
//! The connector owns a background task that walks the connection state
//! machine:
//!
//! ```text
//! DISCONNECTED -> CONNECTING -> CONNECTED -> RECONNECTING -> CONNECTING ...
//!        ^____________________ close() ______________________|
//! ```
//!
//! Every failure (open error, connect timeout, stream error, server close,
//! idle timeout) schedules a reconnect after [`BackoffPolicy`] delay. Failures
//! are never returned to callers; they only show up as `live=false` on the
//! status channel.
//!
//! ## Cancellation
//!
//! `close()` bumps an epoch counter and aborts the task. A task that wakes
//! after its epoch was retired stops without touching shared state, so a
//! pending reconnect timer can never fire after `close()` returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time;

use crate::domain::connection::{BackoffPolicy, Connection, ConnectionState, LinkStatus};
use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};
use crate::domain::stream::{EventIdentity, RawMessage};
use crate::ports::{Frame, FrameStream, JitterSource, PushChannel, TransportError};

/// Timing configuration for the connector.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Upper bound on `PushChannel::open`.
    pub connect_timeout: Duration,
    /// Longest gap between frames (data or heartbeat) before the stream is
    /// considered dead.
    pub idle_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ConnectorConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

struct Worker {
    handle: JoinHandle<()>,
    nudge: Arc<Notify>,
}

struct LinkState {
    connection: Connection,
    epoch: u64,
    worker: Option<Worker>,
}

struct LinkInner {
    channel: Arc<dyn PushChannel>,
    jitter: Arc<dyn JitterSource>,
    config: ConnectorConfig,
    sink: mpsc::Sender<RawMessage>,
    state: Mutex<LinkState>,
    status_tx: watch::Sender<LinkStatus>,
}

impl LinkInner {
    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_status(&self, connection: &Connection) {
        let next = connection.status();
        self.status_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Applies a transition if `epoch` is still current.
    ///
    /// Returns `None` when the worker has been retired and must stop.
    fn apply<T>(
        &self,
        epoch: u64,
        f: impl FnOnce(&mut Connection) -> Result<T, ValidationError>,
    ) -> Option<T> {
        let mut state = self.lock();
        if state.epoch != epoch {
            return None;
        }
        match f(&mut state.connection) {
            Ok(value) => {
                self.publish_status(&state.connection);
                Some(value)
            }
            Err(e) => {
                tracing::error!(
                    state = %state.connection.state,
                    error = %e,
                    "Rejected connection transition; stopping worker"
                );
                None
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }
}

enum StreamEnd {
    Failed(TransportError),
    SinkClosed,
}

/// Resilient push-stream client.
///
/// Decoded messages go to the `mpsc` sink handed to [`TransportConnector::new`];
/// link status is observable through [`TransportConnector::status`].
pub struct TransportConnector {
    inner: Arc<LinkInner>,
}

impl TransportConnector {
    pub fn new(
        channel: Arc<dyn PushChannel>,
        jitter: Arc<dyn JitterSource>,
        sink: mpsc::Sender<RawMessage>,
        config: ConnectorConfig,
    ) -> Self {
        let connection = Connection::new(channel.endpoint());
        let (status_tx, _) = watch::channel(connection.status());
        Self {
            inner: Arc::new(LinkInner {
                channel,
                jitter,
                config,
                sink,
                state: Mutex::new(LinkState {
                    connection,
                    epoch: 0,
                    worker: None,
                }),
                status_tx,
            }),
        }
    }

    /// Starts the link.
    ///
    /// No-op while `CONNECTING` or `CONNECTED`. While `RECONNECTING` the
    /// pending backoff is cut short. Must be called from within a tokio
    /// runtime.
    pub fn connect(&self) -> Result<(), DomainError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            DomainError::new(ErrorCode::InternalError, "connect requires a tokio runtime")
                .with_detail("cause", e.to_string())
        })?;

        let mut state = self.inner.lock();
        match state.connection.state {
            ConnectionState::Connecting | ConnectionState::Connected => Ok(()),
            ConnectionState::Reconnecting => {
                if let Some(worker) = &state.worker {
                    tracing::debug!(address = %state.connection.address, "Reconnect requested; skipping backoff");
                    worker.nudge.notify_one();
                }
                Ok(())
            }
            ConnectionState::Disconnected => {
                state.connection.begin_connect()?;
                self.inner.publish_status(&state.connection);

                if let Some(stale) = state.worker.take() {
                    stale.handle.abort();
                }
                state.epoch += 1;
                let epoch = state.epoch;
                let nudge = Arc::new(Notify::new());
                let handle = runtime.spawn(run_link(
                    Arc::clone(&self.inner),
                    epoch,
                    Arc::clone(&nudge),
                ));
                state.worker = Some(Worker { handle, nudge });

                tracing::info!(address = %state.connection.address, "Connecting to push stream");
                Ok(())
            }
        }
    }

    /// Tears the link down and cancels any pending reconnect.
    ///
    /// Idempotent. `connect()` may be called again afterwards.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        state.epoch += 1;
        if let Some(worker) = state.worker.take() {
            worker.handle.abort();
        }
        let was_active = state.connection.state.is_active();
        state.connection.mark_closed();
        self.inner.publish_status(&state.connection);
        if was_active {
            tracing::info!(address = %state.connection.address, "Push stream closed");
        }
    }

    /// Subscribes to link status changes.
    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn is_live(&self) -> bool {
        self.inner.status_tx.borrow().live
    }

    /// Snapshot of the connection record.
    pub fn connection(&self) -> Connection {
        self.inner.lock().connection.clone()
    }
}

impl Drop for TransportConnector {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        state.epoch += 1;
        if let Some(worker) = state.worker.take() {
            worker.handle.abort();
        }
    }
}

async fn run_link(inner: Arc<LinkInner>, epoch: u64, nudge: Arc<Notify>) {
    let mut first_attempt = true;

    loop {
        if !first_attempt && inner.apply(epoch, Connection::begin_connect).is_none() {
            return;
        }
        first_attempt = false;

        let failure = match time::timeout(inner.config.connect_timeout, inner.channel.open()).await {
            Ok(Ok(frames)) => {
                if inner.apply(epoch, Connection::mark_connected).is_none() {
                    return;
                }
                tracing::info!(address = %inner.channel.endpoint(), "Push stream connected");

                match pump(&inner, epoch, frames).await {
                    StreamEnd::Failed(e) => e,
                    StreamEnd::SinkClosed => {
                        tracing::debug!("Message sink closed; stopping connector");
                        let mut state = inner.lock();
                        if state.epoch == epoch {
                            state.connection.mark_closed();
                            inner.publish_status(&state.connection);
                        }
                        return;
                    }
                }
            }
            Ok(Err(e)) => e,
            Err(_) => TransportError::Timeout(inner.config.connect_timeout),
        };

        let Some(retry) =
            inner.apply(epoch, |conn| conn.mark_failed(DomainError::from(failure.clone())))
        else {
            return;
        };
        let delay = inner
            .config
            .backoff
            .delay_with(retry, |ceiling| inner.jitter.sample(ceiling));
        if inner
            .apply(epoch, |conn| {
                conn.schedule_retry(delay);
                Ok(())
            })
            .is_none()
        {
            return;
        }

        if failure.is_retryable() {
            tracing::warn!(
                retry,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Push stream unavailable; reconnecting"
            );
        } else {
            tracing::error!(
                retry,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Push stream rejected the request; retrying anyway"
            );
        }

        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = nudge.notified() => {}
        }
    }
}

async fn pump(inner: &LinkInner, epoch: u64, mut frames: FrameStream) -> StreamEnd {
    loop {
        let next = match time::timeout(inner.config.idle_timeout, frames.next()).await {
            Ok(next) => next,
            Err(_) => return StreamEnd::Failed(TransportError::Timeout(inner.config.idle_timeout)),
        };

        let (text, transport_id) = match next {
            None => return StreamEnd::Failed(TransportError::Closed),
            Some(Err(e)) => return StreamEnd::Failed(e),
            Some(Ok(Frame::Heartbeat)) => {
                tracing::trace!("Heartbeat");
                continue;
            }
            Some(Ok(Frame::Data(text))) => (text, None),
            Some(Ok(Frame::Event { id, data })) => (data, Some(id)),
        };

        let payload = match serde_json::from_str(&text) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, bytes = text.len(), "Dropping malformed frame");
                continue;
            }
        };

        if !inner.is_current(epoch) {
            return StreamEnd::SinkClosed;
        }
        let mut message = RawMessage::pushed(payload);
        if let Some(id) = transport_id {
            message = message.with_identity_hint(EventIdentity::from_string(id));
        }
        if inner.sink.send(message).await.is_err() {
            return StreamEnd::SinkClosed;
        }
    }
}
