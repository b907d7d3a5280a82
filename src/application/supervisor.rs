//! IngestionPipeline - Single owner of the connector/poller/reconciler triad.
//!
//! Both upstreams write into one bounded inbox; one task drains it into the
//! reconciler, so reconciliation and dispatch never run concurrently with
//! each other. The poller only produces while the connector reports
//! `live=false`, which keeps exactly one active upstream at a time.
//!
//! ```text
//! TransportConnector ──┐
//!                      ├─> inbox ─> EventReconciler ─> EventDispatcher ─> consumers
//! FallbackPoller ──────┘
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::connector::{ConnectorConfig, TransportConnector};
use super::poller::{FallbackPoller, PollerConfig, PollerStats};
use super::reconciler::{EventReconciler, ReconcilerStats};
use crate::adapters::events::EventDispatcher;
use crate::domain::connection::LinkStatus;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::reconciliation::{DedupWindow, DEFAULT_EVICTION_BATCH, DEFAULT_WINDOW_SIZE};
use crate::domain::stream::RawMessage;
use crate::ports::{JitterSource, PullSource, PushChannel};

/// Everything needed to assemble a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub connector: ConnectorConfig,
    pub poller: PollerConfig,
    pub window_size: usize,
    pub eviction_batch: usize,
    /// Inbox capacity shared by both upstreams.
    pub inbox_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            connector: ConnectorConfig::default(),
            poller: PollerConfig::default(),
            window_size: DEFAULT_WINDOW_SIZE,
            eviction_batch: DEFAULT_EVICTION_BATCH,
            inbox_capacity: 1024,
        }
    }
}

/// Point-in-time view of the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub link: LinkStatus,
    pub reconciler: ReconcilerStats,
    pub poller: PollerStats,
}

pub struct IngestionPipeline {
    id: Uuid,
    connector: TransportConnector,
    poller: Arc<FallbackPoller>,
    reconciler: Arc<EventReconciler>,
    dispatcher: EventDispatcher,
    inbox: Mutex<Option<mpsc::Receiver<RawMessage>>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl IngestionPipeline {
    pub fn new(
        push: Arc<dyn PushChannel>,
        pull: Arc<dyn PullSource>,
        jitter: Arc<dyn JitterSource>,
        config: PipelineConfig,
    ) -> Result<Self, DomainError> {
        let window = DedupWindow::new(config.window_size, config.eviction_batch)?;
        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity.max(1));
        let dispatcher = EventDispatcher::new();

        let connector = TransportConnector::new(push, jitter, inbox_tx.clone(), config.connector);
        let poller = Arc::new(FallbackPoller::new(pull, inbox_tx, config.poller));
        let reconciler = Arc::new(EventReconciler::new(window, Arc::new(dispatcher.clone())));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            id: Uuid::new_v4(),
            connector,
            poller,
            reconciler,
            dispatcher,
            inbox: Mutex::new(Some(inbox_rx)),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Distinguishes pipelines in logs when several run in one process.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Bus that consumers subscribe on.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn reconciler(&self) -> &EventReconciler {
        &self.reconciler
    }

    /// Spawns the reconcile loop and the poller, then opens the push link.
    ///
    /// A second call only re-issues `connect()` on the link. Outside a tokio
    /// runtime this fails with `InternalError` and leaves the pipeline
    /// unstarted.
    pub fn start(&self) -> Result<(), DomainError> {
        let runtime = Handle::try_current().map_err(|e| {
            DomainError::new(ErrorCode::InternalError, "start requires a tokio runtime")
                .with_detail("cause", e.to_string())
        })?;
        let inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner).take();

        if let Some(inbox) = inbox {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.push(runtime.spawn(reconcile_loop(
                Arc::clone(&self.reconciler),
                inbox,
                self.shutdown_tx.subscribe(),
            )));

            let poller = Arc::clone(&self.poller);
            let link = self.connector.status();
            let shutdown = self.shutdown_tx.subscribe();
            tasks.push(runtime.spawn(async move { poller.run(link, shutdown).await }));
            tracing::info!(pipeline_id = %self.id, "Ingestion pipeline started");
        }

        self.connector.connect()
    }

    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.connector.status()
    }

    pub fn is_live(&self) -> bool {
        self.connector.is_live()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            link: *self.connector.status().borrow(),
            reconciler: self.reconciler.stats(),
            poller: self.poller.stats(),
        }
    }

    /// Closes the link, stops the poller and drains the inbox.
    ///
    /// Messages already buffered are still reconciled before this returns.
    pub async fn shutdown(&self) {
        self.connector.close();
        self.shutdown_tx.send_replace(true);

        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Pipeline task ended abnormally");
            }
        }
        tracing::info!(
            pipeline_id = %self.id,
            stats = ?self.reconciler.stats(),
            "Ingestion pipeline stopped"
        );
    }
}

async fn reconcile_loop(
    reconciler: Arc<EventReconciler>,
    mut inbox: mpsc::Receiver<RawMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            next = inbox.recv() => match next {
                Some(raw) => {
                    reconciler.ingest(raw);
                }
                None => return,
            },
        }
    }

    while let Ok(raw) = inbox.try_recv() {
        reconciler.ingest(raw);
    }
}
