//! HTTP adapters for the upstream ports.
//!
//! - `HttpPushChannel` - Streaming GET decoded as SSE or NDJSON
//! - `HttpPullSource` - Single JSON GET for the fallback poller
//! - `FrameDecoder` - Incremental body framing shared by both

mod frame_decoder;
mod pull_source;
mod push_channel;

pub use frame_decoder::{decode_frames, FrameDecoder, Framing};
pub use pull_source::{HttpPullConfig, HttpPullSource};
pub use push_channel::{HttpPushChannel, HttpPushConfig};

use std::time::Duration;

use crate::ports::TransportError;

/// Maps a reqwest send error to the transport taxonomy.
fn map_request_error(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout)
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Stream(e.to_string())
    }
}
