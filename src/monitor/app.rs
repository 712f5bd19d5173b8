//! Top-level wiring and lifecycle of the ingestion pipeline
//!
//! One `Config` and one `SharedState` are constructed here and injected
//! into every component; nothing reads ambient globals. Shutdown drains
//! in-flight work before the outbound channels close.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::monitor::enrichment::EnrichmentClient;
use crate::monitor::handoff::TokenUpdateHub;
use crate::monitor::inspector::TransactionInspector;
use crate::monitor::processor::EventProcessor;
use crate::monitor::state::SharedState;
use crate::monitor::status::StatusMessage;
use crate::monitor::stream::{LogEvent, StreamClient};
use crate::monitor::telemetry::{MetricsSnapshot, WatchMetrics};
use crate::notify::{DiscordWebhookNotifier, Notifier, TracingNotifier};
use crate::storage::{ReportStore, SledReportStore};
use crate::types::TokenSnapshot;

pub struct App {
    state: Arc<SharedState>,
    hub: Arc<TokenUpdateHub>,
    enrichment: Arc<EnrichmentClient>,
    inspector: Arc<TransactionInspector>,
    metrics: Arc<WatchMetrics>,
    shutdown_tx: watch::Sender<bool>,
    stream: Option<StreamClient>,
    event_rx: Option<mpsc::Receiver<LogEvent>>,
    processor: Option<EventProcessor>,
    status_rx: Option<mpsc::Receiver<StatusMessage>>,
    handles: Vec<JoinHandle<()>>,
}

impl App {
    /// Validate the configuration and wire every component. Fails fast on
    /// invalid config or unreachable storage; never on transport state.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let (status_tx, status_rx) = mpsc::channel(config.pipeline.status_channel_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.pipeline.event_queue_capacity);

        let metrics = Arc::new(WatchMetrics::new());
        let state = Arc::new(SharedState::new(
            status_tx,
            config.pipeline.status_history_cap,
            Arc::clone(&metrics),
        ));
        let hub = Arc::new(TokenUpdateHub::new());

        let store: Option<Arc<dyn ReportStore>> = if config.storage.db_path.is_empty() {
            None
        } else {
            let store =
                SledReportStore::open(&config.storage.db_path).context("opening report store")?;
            let history = store.load().context("loading persisted mint state")?;
            if !history.is_empty() {
                info!("seeding state with {} persisted mint(s)", history.len());
            }
            state.seed(history);
            Some(Arc::new(store))
        };

        let mut notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(TracingNotifier)];
        if !config.notify.discord_webhook_url.is_empty() {
            notifiers.push(Arc::new(DiscordWebhookNotifier::new(
                reqwest::Client::new(),
                config.notify.discord_webhook_url.clone(),
                Arc::clone(&state),
            )));
        }

        let enrichment = Arc::new(
            EnrichmentClient::new(
                config.enrichment.clone(),
                Arc::clone(&state),
                Arc::clone(&hub),
                notifiers,
                store,
                Arc::clone(&metrics),
            )
            .context("building enrichment client")?,
        );

        let inspector = Arc::new(TransactionInspector::new(
            config.rpc.clone(),
            config.stream.watched_account.clone(),
            Arc::clone(&state),
            Arc::clone(&enrichment),
            Arc::clone(&metrics),
            config.pipeline.inspector_workers,
            config.pipeline.inspector_queue_capacity,
        ));

        let processor = EventProcessor::new(
            Arc::clone(&inspector),
            Arc::clone(&state),
            Arc::clone(&metrics),
        );

        let stream = StreamClient::new(
            config.stream.clone(),
            event_tx,
            Arc::clone(&state),
            Arc::clone(&metrics),
        );

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            state,
            hub,
            enrichment,
            inspector,
            metrics,
            shutdown_tx,
            stream: Some(stream),
            event_rx: Some(event_rx),
            processor: Some(processor),
            status_rx: Some(status_rx),
            handles: Vec::new(),
        })
    }

    /// Spawn the stream supervisor and the event drain loop. Calling run
    /// twice is a no-op.
    pub fn run(&mut self) {
        let (Some(stream), Some(mut event_rx), Some(processor)) = (
            self.stream.take(),
            self.event_rx.take(),
            self.processor.take(),
        ) else {
            return;
        };

        let supervisor_shutdown = self.shutdown_tx.subscribe();
        self.handles.push(tokio::spawn(async move {
            stream.run_with_reconnect(supervisor_shutdown).await;
        }));

        let mut drain_shutdown = self.shutdown_tx.subscribe();
        self.handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = async { let _ = drain_shutdown.wait_for(|&stop| stop).await; } => break,
                    event = event_rx.recv() => match event {
                        Some(event) => processor.process_log(event).await,
                        None => break,
                    }
                }
            }
            info!("event drain loop stopped");
        }));
    }

    /// Fire the shutdown signal and drain: supervisor and drain loop exit
    /// at their current suspension point, the inspector queue closes and
    /// its workers are joined, then in-flight enrichment completes. Only
    /// after that do the outbound channels close (with the App).
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        self.inspector.shutdown().await;
        self.enrichment.shutdown().await;
        let snapshot = self.metrics.snapshot();
        info!(?snapshot, "pipeline stopped");
    }

    /// Register a token-snapshot consumer queue
    pub fn subscribe_tokens(&self, capacity: usize) -> mpsc::Receiver<Vec<TokenSnapshot>> {
        self.hub.subscribe(capacity)
    }

    /// Hand out the status receiver to the status sink (once)
    pub fn take_status_receiver(&mut self) -> Option<mpsc::Receiver<StatusMessage>> {
        self.status_rx.take()
    }

    /// Consumer-driven report refresh
    pub async fn refresh_report(&self, mint: String) {
        self.enrichment.request_report_on_demand(mint).await;
    }

    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
