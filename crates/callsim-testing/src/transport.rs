//! Scripted transport double.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use callsim_delivery::{DeliveryError, Result, Transport, TransportResponse};

/// One scripted reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Respond with this HTTP status.
    Status(u16),
    /// Fail as if the connection was refused.
    NetworkError,
}

/// A POST the transport received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPost {
    /// Target URL.
    pub url: String,
    /// Request body.
    pub payload: Bytes,
}

/// Transport that replays a fixed script, then a fallback step forever.
///
/// Every post is recorded. An optional latency keeps each post in flight so
/// tests can observe concurrency limits through [`ScriptedTransport::max_in_flight`].
#[derive(Debug)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    latency: Duration,
    posts: Mutex<Vec<RecordedPost>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    /// Replays `steps`, then answers 200.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback: Step::Status(200),
            latency: Duration::ZERO,
            posts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answers with `step`.
    pub fn always(step: Step) -> Self {
        Self { fallback: step, ..Self::new([]) }
    }

    /// Always answers 200.
    pub fn accepting() -> Self {
        Self::new([])
    }

    /// Fails the first `k` posts with network errors, then answers 200.
    pub fn failing_first(k: usize) -> Self {
        Self::new(std::iter::repeat(Step::NetworkError).take(k))
    }

    /// Holds every post for `latency` before answering.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every post received so far, in arrival order.
    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of posts received so far.
    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Highest number of posts that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner).pop_front().unwrap_or(self.fallback)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, url: &str, payload: Bytes) -> Result<TransportResponse> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedPost { url: url.to_string(), payload });
        let step = self.next_step();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match step {
            Step::Status(status_code) => Ok(TransportResponse { status_code, duration: self.latency }),
            Step::NetworkError => Err(DeliveryError::network("connection refused")),
        }
    }
}
