//! Client side of the daemon hop.

use std::time::Duration;

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hmsconsole_config::DaemonConfig;
use reqwest::{Client, ClientBuilder};
use serde_json::json;
use thiserror::Error;

/// Anything that kept a daemon reply from reaching the caller.
///
/// The daemon's own query errors are not represented here: they arrive as
/// JSON and are relayed like any other reply.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("Daemon did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Daemon unreachable: {0}")]
    Unreachable(reqwest::Error),

    #[error("Daemon returned a malformed response: {0}")]
    Malformed(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "error",
            "message": self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// A daemon reply, already checked to be JSON.
#[derive(Debug, Clone)]
pub struct RelayedReply {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Forwards query text to the daemon's `/query` endpoint.
#[derive(Debug, Clone)]
pub struct QueryProxy {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl QueryProxy {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProxyError> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(ProxyError::Client)?;

        Ok(Self { client, endpoint: endpoint.into(), timeout })
    }

    pub fn from_config(config: &DaemonConfig) -> Result<Self, ProxyError> {
        Self::new(config.query_url.clone(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one query and wait for its reply. No retries.
    pub async fn forward(&self, query: Bytes) -> Result<RelayedReply, ProxyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(query)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| ProxyError::Malformed(e.to_string()))?;
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        serde_json::from_slice::<serde::de::IgnoredAny>(&body)
            .map_err(|e| ProxyError::Malformed(format!("body is not JSON ({e})")))?;

        Ok(RelayedReply { status, body })
    }

    fn classify(&self, err: reqwest::Error) -> ProxyError {
        if err.is_timeout() {
            ProxyError::Timeout(self.timeout)
        } else {
            ProxyError::Unreachable(err)
        }
    }
}
