//! HTTP server setup for the health endpoints.
//!
//! Requests flow through request tracing and a timeout before reaching the
//! handlers. The server stops accepting connections once the shutdown
//! future resolves and waits for in-flight requests.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use axum::{http::StatusCode, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::handlers::{self, HealthService};

/// Upper bound on handling one request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates the router serving `/health` and `/live`.
pub fn create_router(health: Arc<HealthService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness_check))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(health)
}

/// Binds `addr` and serves the health router until `shutdown` resolves.
///
/// # Errors
///
/// Returns `std::io::Error` if the address can not be bound.
pub async fn start_server<F>(
    addr: SocketAddr,
    health: Arc<HealthService>,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve(listener, health, shutdown).await
}

/// Serves the health router on an already bound listener.
///
/// # Errors
///
/// Returns `std::io::Error` if accepting connections fails.
pub async fn serve<F>(
    listener: TcpListener,
    health: Arc<HealthService>,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Health server listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(health)).with_graceful_shutdown(shutdown).await?;

    info!("Health server stopped gracefully");
    Ok(())
}

/// Waits for CTRL+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
