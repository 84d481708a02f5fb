//! Mock HTTP collector for end-to-end delivery tests.

use serde_json::Value;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Wiremock server standing in for a downstream record collector.
pub struct MockCollector {
    server: MockServer,
}

impl MockCollector {
    /// Starts a collector on a random port.
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    /// Absolute URL for `endpoint` on this collector.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.server.uri())
    }

    /// Answers every POST to `endpoint` with `status`.
    pub async fn respond_with_status(&self, endpoint: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answers the first `failures` POSTs with `status`, then 200.
    pub async fn fail_then_accept(&self, endpoint: &str, failures: u64, status: u16) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(failures)
            .with_priority(1)
            .mount(&self.server)
            .await;
        self.respond_with_status(endpoint, 200).await;
    }

    /// JSON bodies of every POST received on `endpoint`, in arrival order.
    pub async fn received_json(&self, endpoint: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == endpoint)
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }
}
