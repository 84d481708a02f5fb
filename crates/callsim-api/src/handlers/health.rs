//! Health check handlers for service monitoring.
//!
//! The simulator is healthy when it holds both its configuration and a
//! running call status service. Results are cached for a short window so
//! frequent probes stay cheap.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use callsim_core::Clock;
use callsim_delivery::StatsSnapshot;
use callsim_simulator::CallStatusService;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::config::Config;

/// Health check response structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Whether configuration is loaded
    pub config_status: ComponentStatus,
    /// Whether the call status service is running
    pub call_service_status: ComponentStatus,
    /// Calls not yet purged
    pub active_calls: usize,
    /// Status delivery counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<StatsSnapshot>,
    /// Explanation when not healthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// One component missing
    Degraded,
    /// Nothing to serve
    Unhealthy,
}

impl HealthStatus {
    /// HTTP status answered for this health state.
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Healthy => StatusCode::OK,
            Self::Degraded | Self::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Component-level health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is present
    Up,
    /// Component is missing
    Down,
}

/// Health evaluation over the process's shared components.
#[derive(Debug)]
pub struct HealthService {
    config: Option<Arc<Config>>,
    calls: Option<Arc<CallStatusService>>,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
    cached: Mutex<Option<(Instant, HealthResponse)>>,
}

impl HealthService {
    /// Creates a health service that reuses each result for `cache_ttl`.
    pub fn new(
        config: Option<Arc<Config>>,
        calls: Option<Arc<CallStatusService>>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
    ) -> Self {
        Self { config, calls, clock, cache_ttl, cached: Mutex::new(None) }
    }

    /// Returns the cached result, or evaluates a fresh one once it expired.
    pub async fn check(&self) -> HealthResponse {
        let mut cached = self.cached.lock().await;
        let now = self.clock.now();

        if let Some((checked_at, response)) = cached.as_ref() {
            if now.saturating_duration_since(*checked_at) < self.cache_ttl {
                return response.clone();
            }
        }

        let response = self.evaluate();
        *cached = Some((now, response.clone()));
        response
    }

    fn evaluate(&self) -> HealthResponse {
        debug!("Performing health check");

        let config_status = component(self.config.is_some());
        let call_service_status = component(self.calls.is_some());

        let (status, details) = match (config_status, call_service_status) {
            (ComponentStatus::Up, ComponentStatus::Up) => (HealthStatus::Healthy, None),
            (ComponentStatus::Down, ComponentStatus::Up) => {
                (HealthStatus::Degraded, Some("configuration not loaded".to_string()))
            },
            (ComponentStatus::Up, ComponentStatus::Down) => {
                (HealthStatus::Degraded, Some("call status service not running".to_string()))
            },
            (ComponentStatus::Down, ComponentStatus::Down) => (
                HealthStatus::Unhealthy,
                Some("configuration not loaded and call status service not running".to_string()),
            ),
        };

        HealthResponse {
            status,
            timestamp: self.clock.now_utc(),
            config_status,
            call_service_status,
            active_calls: self.calls.as_ref().map_or(0, |calls| calls.active_calls()),
            delivery: self.calls.as_ref().map(|calls| calls.stats()),
            details,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn component(present: bool) -> ComponentStatus {
    if present {
        ComponentStatus::Up
    } else {
        ComponentStatus::Down
    }
}

/// Health check endpoint handler.
#[instrument(name = "health_check", skip(health))]
pub async fn health_check(State(health): State<Arc<HealthService>>) -> Response {
    let response = health.check().await;

    if response.status != HealthStatus::Healthy {
        warn!(
            status = ?response.status,
            details = response.details.as_deref().unwrap_or_default(),
            "Health check failed"
        );
    }
    debug!(
        status = ?response.status,
        active_calls = response.active_calls,
        "Health check completed"
    );

    (response.status.status_code(), Json(response)).into_response()
}

/// Liveness check endpoint for orchestration probes.
///
/// Answers as long as the HTTP server is responding.
#[instrument(name = "liveness_check", skip(health))]
pub async fn liveness_check(State(health): State<Arc<HealthService>>) -> Response {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": health.clock.now_utc(),
        "service": "callsim"
    });

    (StatusCode::OK, Json(response)).into_response()
}
