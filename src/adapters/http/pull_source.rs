//! HTTP implementation of [`PullSource`] for the fallback poller.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::map_request_error;
use crate::ports::{PullSource, TransportError};

#[derive(Debug, Clone)]
pub struct HttpPullConfig {
    pub url: String,
    auth_token: Option<Secret<String>>,
    pub request_timeout: Duration,
}

impl HttpPullConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_auth_token(mut self, token: Secret<String>) -> Self {
        self.auth_token = Some(token);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

pub struct HttpPullSource {
    config: HttpPullConfig,
    client: Client,
}

impl HttpPullSource {
    pub fn new(config: HttpPullConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Connect(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl PullSource for HttpPullSource {
    async fn fetch(&self) -> Result<JsonValue, TransportError> {
        let mut request = self
            .client
            .get(&self.config.url)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.config.auth_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_request_error(e, self.config.request_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<JsonValue>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn endpoint(&self) -> &str {
        &self.config.url
    }
}
