//! HTTP streaming implementation of [`PushChannel`].
//!
//! Issues a long-lived GET and decodes the chunked body as SSE or NDJSON.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;

use super::frame_decoder::{decode_frames, Framing};
use super::map_request_error;
use crate::ports::{FrameStream, PushChannel, TransportError};

/// Configuration for the HTTP push channel.
#[derive(Debug, Clone)]
pub struct HttpPushConfig {
    pub url: String,
    pub framing: Framing,
    auth_token: Option<Secret<String>>,
    /// Applies to establishing the TCP/TLS connection only. The body read
    /// is unbounded; idle detection belongs to the connector.
    pub connect_timeout: Duration,
}

impl HttpPushConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            framing: Framing::default(),
            auth_token: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_auth_token(mut self, token: Secret<String>) -> Self {
        self.auth_token = Some(token);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

pub struct HttpPushChannel {
    config: HttpPushConfig,
    client: Client,
}

impl HttpPushChannel {
    pub fn new(config: HttpPushConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::Connect(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl PushChannel for HttpPushChannel {
    async fn open(&self) -> Result<FrameStream, TransportError> {
        let mut request = self
            .client
            .get(&self.config.url)
            .header(ACCEPT, self.config.framing.accept_header())
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = &self.config.auth_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_request_error(e, self.config.connect_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(url = %self.config.url, status = %status, "Push stream opened");
        Ok(decode_frames(response.bytes_stream(), self.config.framing))
    }

    fn endpoint(&self) -> &str {
        &self.config.url
    }
}
