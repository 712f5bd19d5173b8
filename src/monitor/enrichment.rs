//! Risk-report enrichment with bounded concurrency and retry
//!
//! Each fetch holds a semaphore permit for its whole duration; the permit
//! is released on drop whatever the outcome. Fetch failures are retried a
//! bounded number of times with linearly increasing delays, then surfaced
//! as a status message without touching state.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_retry::Retry;
use tracing::debug;

use crate::config::EnrichmentConfig;
use crate::monitor::errors::WatchError;
use crate::monitor::handoff::TokenUpdateHub;
use crate::monitor::state::SharedState;
use crate::monitor::status::{LogLevel, StatusMessage};
use crate::monitor::telemetry::WatchMetrics;
use crate::notify::Notifier;
use crate::storage::ReportStore;
use crate::types::Report;

pub struct EnrichmentClient {
    http: reqwest::Client,
    config: EnrichmentConfig,
    state: Arc<SharedState>,
    hub: Arc<TokenUpdateHub>,
    notifiers: Vec<Arc<dyn Notifier>>,
    store: Option<Arc<dyn ReportStore>>,
    permits: Arc<Semaphore>,
    tasks: tokio::sync::Mutex<JoinSet<()>>,
    metrics: Arc<WatchMetrics>,
}

impl EnrichmentClient {
    pub fn new(
        config: EnrichmentConfig,
        state: Arc<SharedState>,
        hub: Arc<TokenUpdateHub>,
        notifiers: Vec<Arc<dyn Notifier>>,
        store: Option<Arc<dyn ReportStore>>,
        metrics: Arc<WatchMetrics>,
    ) -> Result<Self, WatchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_requests));
        Ok(Self {
            http,
            config,
            state,
            hub,
            notifiers,
            store,
            permits,
            tasks: tokio::sync::Mutex::new(JoinSet::new()),
            metrics,
        })
    }

    /// Fetch, classify, and record the report for one mint.
    ///
    /// Returns true when this invocation is terminal for the mint - the
    /// high-risk discard branch, or a fetch that exhausted its retries
    /// (the mint stays unenriched until the next trigger). Returns false
    /// after the normal success path.
    pub async fn fetch_and_process_report(&self, mint: &str) -> bool {
        // Permit released on drop, success or failure
        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return true,
        };

        let base_delay = self.config.retry_base_delay_ms;
        let delays = (1..self.config.fetch_attempts as u64)
            .map(|attempt| Duration::from_millis(base_delay * attempt));

        let report = match Retry::spawn(delays, || self.try_fetch_report(mint)).await {
            Ok(report) => report,
            Err(e) => {
                self.metrics.report_failures.fetch_add(1, Ordering::Relaxed);
                self.state
                    .add_status_message(StatusMessage::new(
                        LogLevel::Error,
                        format!("Error fetching report for {mint}: {e}"),
                    ))
                    .await;
                return true;
            }
        };

        if report.score > self.config.high_risk_score {
            self.metrics.reports_discarded.fetch_add(1, Ordering::Relaxed);
            self.state
                .add_status_message(StatusMessage::new(
                    LogLevel::None,
                    format!(
                        "💩 Token Sym:[{}]: '{}' Score[{}]",
                        report.token_meta.symbol, report.token_meta.name, report.score
                    ),
                ))
                .await;
            return true;
        }

        for notifier in &self.notifiers {
            notifier.notify(mint, &report).await;
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.add_report(mint, &report) {
                self.state
                    .add_status_message(StatusMessage::new(
                        LogLevel::Warn,
                        format!("Failed to persist report for {mint}: {e}"),
                    ))
                    .await;
            }
        }

        self.metrics.reports_accepted.fetch_add(1, Ordering::Relaxed);
        self.state.update_mint_state(mint, report);
        self.state.send_token_updates(&self.hub).await;
        false
    }

    /// One GET against the report endpoint
    async fn try_fetch_report(&self, mint: &str) -> Result<Report, WatchError> {
        let url = format!("{}/v1/tokens/{}/report", self.config.report_api_url, mint);
        debug!("fetching report from {url}");

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(WatchError::ReportStatus(response.status().as_u16()));
        }
        Ok(response.json::<Report>().await?)
    }

    /// Run the fetch as a tracked background task
    pub async fn spawn_fetch(self: &Arc<Self>, mint: String) {
        let client = Arc::clone(self);
        let mut tasks = self.tasks.lock().await;
        // Reap whatever already finished so the set stays small
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            client.fetch_and_process_report(&mint).await;
        });
    }

    /// Public re-entry point for consumer-driven refreshes; history may
    /// therefore hold several reports per mint.
    pub async fn request_report_on_demand(self: &Arc<Self>, mint: String) {
        self.spawn_fetch(mint).await;
    }

    /// Wait for every in-flight fetch to complete
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}
