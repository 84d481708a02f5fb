//! Concurrent call creation and advancement.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use callsim_core::RealClock;
use callsim_simulator::{AccountProfile, CallStatusService, SimulatorConfig};
use callsim_testing::{assert_history_prefix, test_policy, RecordingSink, ScriptedTransport};
use serde_json::Value;

const WORKERS: usize = 2;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_and_passes_stay_consistent() {
    let transport =
        Arc::new(ScriptedTransport::accepting().with_latency(Duration::from_millis(1)));
    let config = SimulatorConfig {
        account: AccountProfile { account_id: "acct-stress".to_string(), service_type: 1 },
        cdr_url: "http://collector.test/cdr".to_string(),
        status_url: "http://collector.test/status".to_string(),
        workers: WORKERS,
        retry_policy: test_policy(1),
        shutdown_timeout: Duration::from_secs(5),
    };
    let service = Arc::new(
        CallStatusService::new(
            &config,
            transport.clone(),
            Arc::new(RecordingSink::new()),
            Arc::new(RealClock::new()),
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..25 {
                service.start_new_call().await.unwrap();
            }
        }));
    }
    for _ in 0..4 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..30 {
                service.advance_all().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for call in service.registry().snapshot() {
        assert_history_prefix(call.history()).unwrap();
    }

    let bodies: Vec<Value> = transport
        .posts()
        .iter()
        .map(|post| serde_json::from_slice(&post.payload).unwrap())
        .collect();

    let started: Vec<_> = bodies.iter().filter(|b| b["eventType"] == 1).collect();
    let unique: HashSet<_> = started.iter().map(|b| b["callId"].as_str().unwrap()).collect();
    assert_eq!(started.len(), 100);
    assert_eq!(unique.len(), 100, "call identifiers never collide");

    let mut per_call: HashMap<&str, Vec<u64>> = HashMap::new();
    for body in &bodies {
        per_call
            .entry(body["callId"].as_str().unwrap())
            .or_default()
            .push(body["eventType"].as_u64().unwrap());
    }
    for (call_id, events) in &per_call {
        let expected: Vec<u64> = (1..=events.len() as u64).collect();
        assert_eq!(events, &expected, "statuses delivered out of order for {call_id}");
    }

    assert!(transport.max_in_flight() <= WORKERS);
    service.shutdown(Duration::from_secs(5)).await.unwrap();
}
