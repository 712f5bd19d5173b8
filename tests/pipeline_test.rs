//! End-to-end enrichment scenarios against a mock report endpoint

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use mintwatch::config::EnrichmentConfig;
use mintwatch::monitor::{
    EnrichmentClient, LogLevel, SharedState, StatusMessage, TokenUpdateHub, WatchMetrics,
};
use mintwatch::notify::Notifier;
use mintwatch::storage::{ReportStore, SledReportStore};
use mintwatch::types::Report;

struct RecordingNotifier {
    delivered: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, mint: &str, _report: &Report) {
        self.delivered.lock().push(mint.to_string());
    }
}

struct Harness {
    client: Arc<EnrichmentClient>,
    state: Arc<SharedState>,
    hub: Arc<TokenUpdateHub>,
    notifier: Arc<RecordingNotifier>,
    store: Arc<SledReportStore>,
    _status_rx: mpsc::Receiver<StatusMessage>,
}

fn harness(base_url: String) -> Harness {
    let (status_tx, status_rx) = mpsc::channel(512);
    let metrics = Arc::new(WatchMetrics::new());
    let state = Arc::new(SharedState::new(status_tx, 512, Arc::clone(&metrics)));
    let hub = Arc::new(TokenUpdateHub::new());
    let notifier = Arc::new(RecordingNotifier {
        delivered: Mutex::new(Vec::new()),
    });
    let store = Arc::new(SledReportStore::temporary().unwrap());

    let config = EnrichmentConfig {
        report_api_url: base_url,
        retry_base_delay_ms: 10,
        ..EnrichmentConfig::default()
    };
    let client = Arc::new(
        EnrichmentClient::new(
            config,
            Arc::clone(&state),
            Arc::clone(&hub),
            vec![Arc::clone(&notifier) as Arc<dyn Notifier>],
            Some(Arc::clone(&store) as Arc<dyn ReportStore>),
            metrics,
        )
        .unwrap(),
    );

    Harness {
        client,
        state,
        hub,
        notifier,
        store,
        _status_rx: status_rx,
    }
}

fn report_body(symbol: &str, score: i64) -> String {
    format!(r#"{{"tokenMeta": {{"symbol": "{symbol}", "name": "{symbol} token"}}, "score": {score}}}"#)
}

#[tokio::test]
async fn accepted_report_flows_to_every_consumer() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/tokens/M1/report")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(report_body("FOO", 500))
        .create_async()
        .await;

    let harness = harness(server.url());
    let mut updates = harness.hub.subscribe(8);
    harness.state.add_mint("M1");

    assert!(!harness.client.fetch_and_process_report("M1").await);

    // In-memory history
    assert_eq!(harness.state.report_count("M1"), Some(1));
    // Snapshot stream
    let snapshot = updates.recv().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].address, "M1");
    assert_eq!(snapshot[0].symbol, "FOO");
    // Notification fan-out
    assert_eq!(*harness.notifier.delivered.lock(), vec!["M1".to_string()]);
    // Persistence
    assert_eq!(harness.store.load().unwrap()["M1"].len(), 1);
}

#[tokio::test]
async fn high_risk_mint_never_reaches_consumers() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/tokens/M1/report")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(report_body("BAD", 8001))
        .create_async()
        .await;

    let harness = harness(server.url());
    let mut updates = harness.hub.subscribe(8);
    harness.state.add_mint("M1");

    assert!(harness.client.fetch_and_process_report("M1").await);

    assert_eq!(harness.state.report_count("M1"), Some(0));
    assert!(updates.try_recv().is_err());
    assert!(harness.notifier.delivered.lock().is_empty());
    assert!(harness.store.load().unwrap().is_empty());

    let discards: Vec<StatusMessage> = harness
        .state
        .status_history()
        .into_iter()
        .filter(|m| m.level == LogLevel::None)
        .collect();
    assert_eq!(discards.len(), 1, "exactly one discard classification");
}

#[tokio::test]
async fn exhausted_retries_leave_state_untouched() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/tokens/M1/report")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let harness = harness(server.url());
    harness.state.add_mint("M1");

    assert!(harness.client.fetch_and_process_report("M1").await);

    mock.assert_async().await;
    assert_eq!(harness.state.report_count("M1"), Some(0));
    assert!(harness.notifier.delivered.lock().is_empty());
    let last = harness.state.status_history().pop().unwrap();
    assert_eq!(last.level, LogLevel::Error);
}

#[tokio::test]
async fn concurrent_enrichment_stays_attributed() {
    let mut server = mockito::Server::new_async().await;
    let mints: Vec<String> = (0..6).map(|i| format!("MINT{i}")).collect();
    for (i, mint) in mints.iter().enumerate() {
        server
            .mock("GET", format!("/v1/tokens/{mint}/report").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(report_body(&format!("T{i}"), (i as i64 + 1) * 100))
            .create_async()
            .await;
    }

    let harness = harness(server.url());
    for mint in &mints {
        harness.state.add_mint(mint);
        harness.client.spawn_fetch(mint.clone()).await;
    }
    // Join barrier: every in-flight fetch completes before we assert
    harness.client.shutdown().await;

    let map = harness.state.mint_state();
    for (i, mint) in mints.iter().enumerate() {
        let history = &map[mint];
        assert_eq!(history.len(), 1, "{mint} has exactly one report");
        assert_eq!(history[0].score, (i as i64 + 1) * 100);
        assert_eq!(history[0].token_meta.symbol, format!("T{i}"));
    }

    // Latest snapshot covers every enriched mint
    let snapshots = harness.state.token_snapshots();
    assert_eq!(snapshots.len(), mints.len());
}

#[tokio::test]
async fn refresh_prefers_most_recent_report() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/tokens/M1/report")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(report_body("OLD", 100))
        .expect(1)
        .create_async()
        .await;

    let harness = harness(server.url());
    harness.state.add_mint("M1");
    harness.client.fetch_and_process_report("M1").await;

    // Endpoint answer changes between fetches
    server
        .mock("GET", "/v1/tokens/M1/report")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(report_body("NEW", 200))
        .create_async()
        .await;

    harness.client.request_report_on_demand("M1".to_string()).await;
    harness.client.shutdown().await;

    assert_eq!(harness.state.report_count("M1"), Some(2));
    let snapshots = harness.state.token_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].symbol, "NEW");
    assert_eq!(snapshots[0].score, 200);
}
