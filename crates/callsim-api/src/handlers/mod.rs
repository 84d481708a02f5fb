//! HTTP request handlers.

pub mod health;

pub use health::{
    health_check, liveness_check, ComponentStatus, HealthResponse, HealthService, HealthStatus,
};
