//! Periodic tickers that drive the simulation.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{cdr_service::CdrService, config::DriverConfig, status_service::CallStatusService};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Spawns every ticker and returns their handles.
///
/// Tickers stop at their next tick once `token` is cancelled; an operation
/// already running is allowed to finish, retries included.
pub fn spawn_tickers(
    cdr_service: Arc<CdrService>,
    status_service: Arc<CallStatusService>,
    config: DriverConfig,
    token: CancellationToken,
) -> Vec<JoinHandle<()>> {
    info!(
        cdr_tickers = config.cdr_tickers,
        advance_tickers = config.advance_tickers,
        "starting simulation tickers"
    );

    let mut handles = Vec::with_capacity(config.cdr_tickers + config.advance_tickers + 1);

    for ticker in 0..config.cdr_tickers {
        let service = cdr_service.clone();
        let push_cdr = move || {
            let service = service.clone();
            async move {
                // Failures are logged by the service.
                let _ = service.push_generated_cdr().await;
            }
        };
        handles.push(tokio::spawn(run_ticker(
            "cdr",
            ticker,
            config.cdr_interval,
            token.clone(),
            push_cdr,
        )));
    }

    let service = status_service.clone();
    let start_call = move || {
        let service = service.clone();
        async move {
            let _ = service.start_new_call().await;
        }
    };
    handles.push(tokio::spawn(run_ticker(
        "new_call",
        0,
        config.new_call_interval,
        token.clone(),
        start_call,
    )));

    for ticker in 0..config.advance_tickers {
        let service = status_service.clone();
        let advance = move || {
            let service = service.clone();
            async move {
                service.advance_all().await;
            }
        };
        handles.push(tokio::spawn(run_ticker(
            "advance",
            ticker,
            config.status_interval,
            token.clone(),
            advance,
        )));
    }

    handles
}

async fn run_ticker<F, Fut>(
    name: &'static str,
    index: usize,
    period: Duration,
    token: CancellationToken,
    mut action: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = interval.tick() => action().await,
        }
    }

    debug!(ticker = name, index, "ticker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn ticker_runs_until_cancelled() {
        let token = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        let count = move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        };
        let handle =
            tokio::spawn(run_ticker("test", 0, Duration::from_millis(5), token.clone(), count));

        tokio::time::sleep(Duration::from_millis(40)).await;
        token.cancel();
        handle.await.unwrap();

        let after_cancel = runs.load(Ordering::SeqCst);
        assert!(after_cancel >= 2, "ticker ran {after_cancel} times");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_cancel);
    }
}
