//! FallbackPoller - Periodic pull while the push link is down.
//!
//! Polling is gated on the connector's status channel. The first pull fires
//! one interval after the link is seen down, which leaves the connector its
//! first reconnect attempt before any REST traffic. A pull that is in flight
//! when the link comes back is allowed to finish and its messages are still
//! forwarded.
//!
//! Poll responses may be a single message object or an array of messages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::domain::connection::LinkStatus;
use crate::domain::foundation::Timestamp;
use crate::domain::stream::RawMessage;
use crate::ports::{PullSource, TransportError};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Poll counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub polls_issued: u64,
    pub polls_failed: u64,
    pub messages_forwarded: u64,
}

#[derive(Default)]
struct Counters {
    issued: AtomicU64,
    failed: AtomicU64,
    forwarded: AtomicU64,
}

pub struct FallbackPoller {
    source: Arc<dyn PullSource>,
    sink: mpsc::Sender<RawMessage>,
    config: PollerConfig,
    counters: Counters,
}

impl FallbackPoller {
    pub fn new(source: Arc<dyn PullSource>, sink: mpsc::Sender<RawMessage>, config: PollerConfig) -> Self {
        Self {
            source,
            sink,
            config,
            counters: Counters::default(),
        }
    }

    pub fn stats(&self) -> PollerStats {
        PollerStats {
            polls_issued: self.counters.issued.load(Ordering::Relaxed),
            polls_failed: self.counters.failed.load(Ordering::Relaxed),
            messages_forwarded: self.counters.forwarded.load(Ordering::Relaxed),
        }
    }

    /// Runs until `shutdown` changes or either channel's sender is dropped.
    pub async fn run(
        &self,
        mut link: watch::Receiver<LinkStatus>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            // Idle while the push link is live.
            while link.borrow_and_update().live {
                tokio::select! {
                    changed = link.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = shutdown.changed() => return,
                }
            }

            tracing::info!(
                endpoint = %self.source.endpoint(),
                interval_ms = self.config.interval.as_millis() as u64,
                "Push link down; fallback polling active"
            );
            let mut ticker = time::interval_at(Instant::now() + self.config.interval, self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.changed() => return,

                    changed = link.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if link.borrow_and_update().live {
                            tracing::info!("Push link live; fallback polling idle");
                            break;
                        }
                    }

                    _ = ticker.tick() => {
                        if let Err(TransportError::Closed) = self.poll_once().await {
                            if self.sink.is_closed() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Issues one pull and forwards every message it returns.
    ///
    /// Returns the number of messages forwarded.
    pub async fn poll_once(&self) -> Result<usize, TransportError> {
        self.counters.issued.fetch_add(1, Ordering::Relaxed);
        let polled_at = Timestamp::now();

        let body = match self.source.fetch().await {
            Ok(body) => body,
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(endpoint = %self.source.endpoint(), error = %e, "Poll failed");
                return Err(e);
            }
        };

        let messages = match body {
            JsonValue::Array(items) => items,
            single => vec![single],
        };

        let mut forwarded = 0;
        for payload in messages {
            self.sink
                .send(RawMessage::polled(payload, polled_at))
                .await
                .map_err(|_| TransportError::Closed)?;
            forwarded += 1;
        }
        self.counters.forwarded.fetch_add(forwarded as u64, Ordering::Relaxed);
        tracing::debug!(count = forwarded, "Poll forwarded messages");
        Ok(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connection::ConnectionState;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeSource {
        responses: Mutex<Vec<Result<JsonValue, TransportError>>>,
        fetches: AtomicU64,
    }

    impl FakeSource {
        fn new(responses: Vec<Result<JsonValue, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                fetches: AtomicU64::new(0),
            })
        }

        fn fetches(&self) -> u64 {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PullSource for FakeSource {
        async fn fetch(&self) -> Result<JsonValue, TransportError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(json!({"type": "metrics", "value": {"polled": true}}))
            } else {
                responses.remove(0)
            }
        }

        fn endpoint(&self) -> &str {
            "test://latest"
        }
    }

    fn status(live: bool) -> LinkStatus {
        LinkStatus {
            state: if live {
                ConnectionState::Connected
            } else {
                ConnectionState::Reconnecting
            },
            live,
            retry_count: 0,
        }
    }

    fn spawn_poller(
        source: Arc<FakeSource>,
        live: bool,
    ) -> (
        Arc<FallbackPoller>,
        watch::Sender<LinkStatus>,
        watch::Sender<bool>,
        mpsc::Receiver<RawMessage>,
    ) {
        let (tx, rx) = mpsc::channel(64);
        let poller = Arc::new(FallbackPoller::new(source, tx, PollerConfig::default()));
        let (link_tx, link_rx) = watch::channel(status(live));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = Arc::clone(&poller);
        tokio::spawn(async move { runner.run(link_rx, shutdown_rx).await });
        (poller, link_tx, shutdown_tx, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_within_one_interval_when_link_is_down() {
        let source = FakeSource::new(vec![]);
        let (_poller, _link, _shutdown, mut rx) = spawn_poller(source.clone(), false);

        time::sleep(Duration::from_millis(5_100)).await;

        assert_eq!(source.fetches(), 1);
        let msg = rx.recv().await.unwrap();
        assert!(msg.identity_hint.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn never_polls_while_link_is_live() {
        let source = FakeSource::new(vec![]);
        let (_poller, _link, _shutdown, _rx) = spawn_poller(source.clone(), true);

        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_link_recovers_and_resumes_when_it_drops() {
        let source = FakeSource::new(vec![]);
        let (_poller, link, _shutdown, _rx) = spawn_poller(source.clone(), false);

        time::sleep(Duration::from_millis(10_100)).await;
        assert_eq!(source.fetches(), 2);

        link.send(status(true)).unwrap();
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.fetches(), 2);

        link.send(status(false)).unwrap();
        time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_retried_on_the_same_interval() {
        let source = FakeSource::new(vec![
            Err(TransportError::Status {
                status: 503,
                body: "busy".to_string(),
            }),
            Err(TransportError::Timeout(Duration::from_secs(10))),
        ]);
        let (poller, _link, _shutdown, mut rx) = spawn_poller(source.clone(), false);

        time::sleep(Duration::from_millis(15_100)).await;

        assert_eq!(source.fetches(), 3);
        let stats = poller.stats();
        assert_eq!(stats.polls_issued, 3);
        assert_eq!(stats.polls_failed, 2);
        assert_eq!(rx.recv().await.unwrap().payload["value"]["polled"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_polling() {
        let source = FakeSource::new(vec![]);
        let (_poller, _link, shutdown, _rx) = spawn_poller(source.clone(), false);

        time::sleep(Duration::from_secs(1)).await;
        shutdown.send(true).unwrap();
        time::sleep(Duration::from_secs(30)).await;

        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn array_response_is_forwarded_in_order() {
        let source = FakeSource::new(vec![Ok(json!([
            {"id": "a", "type": "metrics", "value": {"x": 1}},
            {"id": "b", "type": "metrics", "value": {"x": 2}},
        ]))]);
        let (tx, mut rx) = mpsc::channel(8);
        let poller = FallbackPoller::new(source, tx, PollerConfig::default());

        assert_eq!(poller.poll_once().await, Ok(2));

        assert_eq!(rx.recv().await.unwrap().payload["id"], "a");
        assert_eq!(rx.recv().await.unwrap().payload["id"], "b");
        assert_eq!(poller.stats().messages_forwarded, 2);
    }
}
