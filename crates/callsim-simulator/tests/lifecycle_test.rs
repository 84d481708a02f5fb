//! Call status and CDR services against a scripted collector.

use std::{sync::Arc, time::Duration};

use callsim_core::EventType;
use callsim_delivery::{DeliveryError, StatsSnapshot};
use callsim_simulator::{
    AccountProfile, AdvanceReport, CallStatusService, CdrService, SimulatorConfig, SimulatorError,
};
use callsim_testing::{
    assert_cdr_timeline, assert_history_prefix, test_policy, RecordingSink, ScriptedTransport,
    Step, TestClock,
};
use serde_json::Value;

const STATUS_URL: &str = "http://collector.test/status";
const CDR_URL: &str = "http://collector.test/cdr";

fn config(times: u32) -> SimulatorConfig {
    SimulatorConfig {
        account: AccountProfile { account_id: "acct-1".to_string(), service_type: 7 },
        cdr_url: CDR_URL.to_string(),
        status_url: STATUS_URL.to_string(),
        workers: 2,
        retry_policy: test_policy(times),
        shutdown_timeout: Duration::from_secs(5),
    }
}

fn status_service(transport: &Arc<ScriptedTransport>, times: u32) -> CallStatusService {
    CallStatusService::new(
        &config(times),
        transport.clone(),
        Arc::new(RecordingSink::new()),
        Arc::new(TestClock::new()),
    )
    .unwrap()
}

fn posted_json(transport: &ScriptedTransport) -> Vec<Value> {
    transport.posts().iter().map(|post| serde_json::from_slice(&post.payload).unwrap()).collect()
}

#[tokio::test]
async fn new_call_pushes_calling_status() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let service = status_service(&transport, 3);

    let receipt = service.start_new_call().await.unwrap();

    assert_eq!(receipt.attempts, 1);
    assert_eq!(service.active_calls(), 1);

    let posts = transport.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].url, STATUS_URL);

    let body: Value = serde_json::from_slice(&posts[0].payload).unwrap();
    assert_eq!(body["eventType"], 1);
    assert_eq!(body["allEventType"], serde_json::json!([1]));
    assert_eq!(body["accountId"], "acct-1");
    assert_eq!(body["serviceType"], 7);
    assert_eq!(body["messageType"], 1);
    assert!(body["subscriptionId"].as_str().unwrap().starts_with("sim_"));
}

#[tokio::test]
async fn call_walks_every_stage_then_is_purged() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let service = status_service(&transport, 3);
    service.start_new_call().await.unwrap();

    let reports = [
        service.advance_all().await,
        service.advance_all().await,
        service.advance_all().await,
    ];
    assert!(reports.iter().all(|r| *r == AdvanceReport { advanced: 1, purged: 0, failed: 0 }));
    assert_eq!(service.active_calls(), 1, "Ended call is kept for one more pass");

    let purge = service.advance_all().await;
    assert_eq!(purge, AdvanceReport { advanced: 0, purged: 1, failed: 0 });
    assert_eq!(service.active_calls(), 0);

    let event_types: Vec<_> = posted_json(&transport).iter().map(|b| b["eventType"].clone()).collect();
    assert_eq!(event_types, vec![1, 2, 3, 4]);

    let last = posted_json(&transport).pop().unwrap();
    assert_eq!(last["allEventType"], serde_json::json!([1, 2, 3, 4]));
}

#[tokio::test]
async fn history_grows_at_most_one_stage_per_pass() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let service = status_service(&transport, 1);
    service.start_new_call().await.unwrap();

    for passes in 1..=3 {
        service.start_new_call().await.unwrap();
        service.advance_all().await;

        for call in service.registry().snapshot() {
            assert_history_prefix(call.history()).unwrap();
            assert!(call.history().len() <= passes + 1);
        }
    }
}

#[tokio::test]
async fn failed_pushes_never_abort_the_pass() {
    let transport = Arc::new(ScriptedTransport::always(Step::Status(500)));
    let service = status_service(&transport, 2);

    for _ in 0..3 {
        let result = service.start_new_call().await;
        assert!(matches!(
            result,
            Err(SimulatorError::Delivery(DeliveryError::RetriesExhausted { attempts: 2, .. }))
        ));
    }
    assert_eq!(service.active_calls(), 3, "calls stay active when their push fails");

    let report = service.advance_all().await;

    assert_eq!(report, AdvanceReport { advanced: 3, purged: 0, failed: 3 });
    assert_eq!(transport.post_count(), 12);
    assert_eq!(
        service.stats(),
        StatsSnapshot { attempts: 12, successes: 0, permanent_failures: 6 }
    );
    for call in service.registry().snapshot() {
        assert_eq!(call.event_type(), EventType::Ringing);
    }
}

#[tokio::test]
async fn pushes_after_shutdown_report_pool_closed() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let service = status_service(&transport, 1);
    service.start_new_call().await.unwrap();

    service.shutdown(Duration::from_secs(1)).await.unwrap();

    let report = service.advance_all().await;
    assert_eq!(report.failed, 1);
    assert!(matches!(
        service.start_new_call().await,
        Err(SimulatorError::Delivery(DeliveryError::PoolClosed))
    ));
}

#[tokio::test]
async fn generated_cdr_is_pushed_to_cdr_collector() {
    let transport = Arc::new(ScriptedTransport::failing_first(1));
    let sink = Arc::new(RecordingSink::new());
    let service = CdrService::new(
        &config(3),
        transport.clone(),
        sink.clone(),
        Arc::new(TestClock::new()),
    )
    .unwrap();

    let receipt = service.push_generated_cdr().await.unwrap();

    assert_eq!(receipt.attempts, 2);
    let posts = transport.posts();
    assert!(posts.iter().all(|post| post.url == CDR_URL));

    let cdr: callsim_core::Cdr = serde_json::from_slice(&posts[0].payload).unwrap();
    assert_cdr_timeline(&cdr).unwrap();
    assert_eq!(cdr.account_id, "acct-1");
    assert_eq!(posts[0].payload, posts[1].payload, "retries resend the same record");

    let outcomes = sink.outcomes();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.call_id == cdr.call_id));
}

#[tokio::test]
async fn given_cdr_is_delivered_unchanged() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let service = CdrService::new(
        &config(1),
        transport.clone(),
        Arc::new(RecordingSink::new()),
        Arc::new(TestClock::new()),
    )
    .unwrap();
    let cdr = service.generate_cdr();

    service.push_cdr(&cdr).await.unwrap();

    let posted: Value = serde_json::from_slice(&transport.posts()[0].payload).unwrap();
    assert_eq!(posted, serde_json::to_value(&cdr).unwrap());
    assert_eq!(service.stats().successes, 1);
}
