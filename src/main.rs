use std::sync::Arc;

use livefeed::adapters::{EventDispatcher, HttpPullSource, HttpPushChannel, ThreadRngJitter};
use livefeed::application::IngestionPipeline;
use livefeed::config::AppConfig;
use livefeed::domain::foundation::DomainError;
use livefeed::domain::reconciliation::EntityUpdate;
use livefeed::domain::stream::{INCIDENT_EVENT, METRICS_EVENT, SESSION_EVENT};
use livefeed::ports::{EventHandler, EventSubscriber};

/// Writes every reconciled update to the log.
struct LogConsumer;

impl EventHandler for LogConsumer {
    fn handle(&self, update: &EntityUpdate) -> Result<(), DomainError> {
        tracing::info!(
            topic = %update.topic,
            entity = %update.state.key,
            version = update.state.version,
            source = %update.source,
            state = %update.state.to_json(),
            "Entity updated"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LogConsumer"
    }
}

fn subscribe_consumers(dispatcher: &EventDispatcher) {
    dispatcher.subscribe_all(
        &[METRICS_EVENT, SESSION_EVENT, INCIDENT_EVENT],
        Arc::new(LogConsumer),
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::load()?;
    config.validate()?;
    livefeed::telemetry::init_tracing(&config.telemetry)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        stream = %config.stream.url,
        poller = %config.poller.url,
        "livefeed starting"
    );

    let push = Arc::new(HttpPushChannel::new(config.stream.push_config())?);
    let pull = Arc::new(HttpPullSource::new(config.poller.pull_config())?);
    let pipeline = IngestionPipeline::new(
        push,
        pull,
        Arc::new(ThreadRngJitter),
        config.pipeline_config(),
    )?;
    subscribe_consumers(pipeline.dispatcher());

    let mut status = pipeline.status();
    pipeline.start()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let link = *status.borrow_and_update();
                tracing::info!(state = %link.state, live = link.live, retry = link.retry_count, "Link status");
            }
        }
    }

    pipeline.shutdown().await;
    Ok(())
}
