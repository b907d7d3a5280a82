//! Application layer - The services that run the ingestion pipeline.
//!
//! - `TransportConnector` - Push link with reconnect and backoff
//! - `FallbackPoller` - Pull path while the push link is down
//! - `EventReconciler` - Dedup and shallow merge into entity state
//! - `IngestionPipeline` - Supervisor wiring the three together

pub mod connector;
pub mod poller;
pub mod reconciler;
pub mod supervisor;

pub use connector::{ConnectorConfig, TransportConnector};
pub use poller::{FallbackPoller, PollerConfig, PollerStats};
pub use reconciler::{EventReconciler, IngestOutcome, ReconcilerStats};
pub use supervisor::{IngestionPipeline, PipelineConfig, PipelineStats};
