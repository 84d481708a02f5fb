//! callsim telecom activity simulator.
//!
//! Main entry point. Loads configuration, starts the health server and the
//! simulation tickers, and drains every delivery pool on shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use callsim_api::{Config, HealthService};
use callsim_core::{Clock, RealClock};
use callsim_delivery::{FileOutcomeLog, HttpTransport, LogStream, StatsSnapshot, Transport};
use callsim_simulator::{spawn_tickers, CallStatusService, CdrService};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let loaded = Config::load();
    init_tracing(loaded.as_ref().map_or("info", |config| config.rust_log.as_str()));

    let config = Arc::new(loaded.inspect_err(|e| {
        error!(error = ?e, "Failed to load configuration");
    })?);

    info!(
        cdr_url = %config.push.cdr_url,
        status_url = %config.push.status_url,
        account_id = %config.account.id,
        workers = config.push.workers,
        retry_times = config.retry.times,
        "Configuration loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(RealClock::new());
    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(config.to_client_config()).context("Failed to build HTTP client")?,
    );

    let cdr_log = FileOutcomeLog::open(&config.log.dir, LogStream::Cdr, config.log.max_file_bytes)
        .await
        .context("Failed to open CDR outcome log")?;
    let status_log =
        FileOutcomeLog::open(&config.log.dir, LogStream::Status, config.log.max_file_bytes)
            .await
            .context("Failed to open status outcome log")?;

    let simulator = config.to_simulator_config()?;
    let cdr_service = Arc::new(
        CdrService::new(&simulator, transport.clone(), Arc::new(cdr_log.clone()), clock.clone())
            .context("Failed to start CDR service")?,
    );
    let status_service = Arc::new(
        CallStatusService::new(&simulator, transport, Arc::new(status_log.clone()), clock.clone())
            .context("Failed to start call status service")?,
    );

    let shutdown = CancellationToken::new();

    let health = Arc::new(HealthService::new(
        Some(config.clone()),
        Some(status_service.clone()),
        clock,
        config.health_cache(),
    ));
    let health_addr = config.health_addr()?;
    let server_handle = tokio::spawn({
        let token = shutdown.clone();
        async move {
            if let Err(e) =
                callsim_api::start_server(health_addr, health, token.cancelled_owned()).await
            {
                error!(error = %e, "Health server failed");
            }
        }
    });

    let tickers = spawn_tickers(
        cdr_service.clone(),
        status_service.clone(),
        config.to_driver_config(),
        shutdown.clone(),
    );
    info!(health_addr = %health_addr, "callsim is running");

    callsim_api::shutdown_signal().await;
    shutdown.cancel();

    for ticker in tickers {
        if let Err(e) = ticker.await {
            warn!(error = %e, "Ticker ended abnormally");
        }
    }
    info!("Tickers stopped");

    let timeout = config.shutdown_timeout();
    if let Err(e) = cdr_service.shutdown(timeout).await {
        warn!(error = %e, "CDR service did not drain cleanly");
    }
    if let Err(e) = status_service.shutdown(timeout).await {
        warn!(error = %e, "Call status service did not drain cleanly");
    }

    cdr_log.flush().await;
    status_log.flush().await;

    if let Err(e) = server_handle.await {
        warn!(error = %e, "Health server task ended abnormally");
    }

    log_stats("cdr", cdr_service.stats());
    log_stats("status", status_service.stats());
    info!("callsim shutdown complete");
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` wins over `fallback`.
fn init_tracing(fallback: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

fn log_stats(stream: &str, stats: StatsSnapshot) {
    info!(
        stream,
        attempts = stats.attempts,
        successes = stats.successes,
        permanent_failures = stats.permanent_failures,
        "Final delivery statistics"
    );
}
