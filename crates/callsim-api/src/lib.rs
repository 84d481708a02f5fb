//! Process configuration and the health endpoint for callsim.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use handlers::{HealthResponse, HealthService, HealthStatus};
pub use server::{create_router, serve, shutdown_signal, start_server};
