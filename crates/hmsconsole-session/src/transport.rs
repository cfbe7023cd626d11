//! Sending queries to the relay.

use std::time::Duration;

use async_trait::async_trait;
use hmsconsole_common::{ConsoleError, DaemonReply, Result};
use hmsconsole_config::ConsoleConfig;
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use tracing::debug;

/// Upper bound for one round trip through the relay.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Carries one query to the daemon and brings back its discriminated reply.
///
/// `Err` means the reply never arrived; a daemon-reported failure is
/// `Ok(DaemonReply::Failure(_))`.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn send(&self, query: &str) -> Result<DaemonReply>;
}

/// Posts raw query text to the web server's `/query` endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| ConsoleError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, url: url.into() })
    }

    pub fn from_config(config: &ConsoleConfig) -> Result<Self> {
        Self::new(config.proxy_url.clone(), DEFAULT_TIMEOUT)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn send(&self, query: &str) -> Result<DaemonReply> {
        debug!(query, "POST {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(query.to_string())
            .send()
            .await?;

        // Relay failures arrive as 500 with a JSON body; read it either way.
        let status = response.status();
        let body: Value = response.json().await?;
        debug!(%status, "Relay answered");
        Ok(DaemonReply::from_value(body))
    }
}
