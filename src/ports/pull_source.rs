//! PullSource port - Interface for the REST endpoint the fallback poller reads.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::TransportError;

/// Port for one pull request.
///
/// The response has the same shape as one push message. Adapters may also
/// return a JSON array of such messages.
#[async_trait]
pub trait PullSource: Send + Sync {
    async fn fetch(&self) -> Result<JsonValue, TransportError>;

    /// Address shown in logs.
    fn endpoint(&self) -> &str;
}
