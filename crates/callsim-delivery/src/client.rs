//! HTTP transport for record delivery.
//!
//! A [`Transport`] performs exactly one POST attempt and reports whatever
//! status came back. Deciding whether that status counts as success is left
//! to the retry layer.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use crate::error::{DeliveryError, Result};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout applied to each POST attempt.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: "callsim/0.1".to_string() }
    }
}

/// Response to a single POST attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Time spent on the request.
    pub duration: Duration,
}

impl TransportResponse {
    /// Whether the collector accepted the record. Only HTTP 200 counts.
    pub fn is_accepted(&self) -> bool {
        self.status_code == 200
    }
}

/// One outbound POST attempt against a collector.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Sends `payload` as a JSON body to `url`.
    ///
    /// Any received response is returned as `Ok`, regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` or `Timeout` when no response arrives, and
    /// `ConfigurationError` when the request cannot be built (bad URL).
    async fn post(&self, url: &str, payload: Bytes) -> Result<TransportResponse>;
}

/// Connection-pooling transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Creates a transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the HTTP client cannot
    /// be configured with the provided settings.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a transport with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    fn map_send_error(&self, error: &reqwest::Error) -> DeliveryError {
        if error.is_timeout() {
            DeliveryError::timeout(self.config.timeout.as_secs())
        } else if error.is_builder() {
            DeliveryError::configuration(format!("invalid request: {error}"))
        } else if error.is_connect() {
            DeliveryError::network(format!("connection failed: {error}"))
        } else {
            DeliveryError::network(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, payload: Bytes) -> Result<TransportResponse> {
        let start_time = Instant::now();
        let span = info_span!("record_delivery", url = %url, payload_bytes = payload.len());

        async move {
            let response = self
                .client
                .post(url)
                .header("content-type", "application/json")
                .body(payload)
                .send()
                .await
                .map_err(|e| {
                    let error = self.map_send_error(&e);
                    tracing::debug!(
                        duration_ms = start_time.elapsed().as_millis(),
                        error = %error,
                        "request failed"
                    );
                    error
                })?;

            let duration = start_time.elapsed();
            let status_code = response.status().as_u16();

            tracing::debug!(
                status_code,
                duration_ms = duration.as_millis(),
                "received response"
            );

            Ok(TransportResponse { status_code, duration })
        }
        .instrument(span)
        .await
    }
}
