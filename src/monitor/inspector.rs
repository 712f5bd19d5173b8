//! Per-signature transaction inspection over a bounded worker pool
//!
//! A fixed number of workers drain the signature queue, fetch each
//! transaction, and scan post-transaction token balances for mints newly
//! credited to the watched account. Fetch errors abandon the signature;
//! retry policy lives in the enrichment layer, not here.

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{UiTransactionEncoding, UiTransactionTokenBalance};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::RpcConfig;
use crate::monitor::enrichment::EnrichmentClient;
use crate::monitor::state::SharedState;
use crate::monitor::status::{LogLevel, StatusMessage};
use crate::monitor::telemetry::WatchMetrics;

/// Balance entries whose owner is `watched_account`, excluding the wrapped
/// native token, deduplicated within the transaction.
pub fn collect_watched_mints(
    post_balances: &[UiTransactionTokenBalance],
    watched_account: &str,
) -> Vec<String> {
    let native_mint = spl_token::native_mint::id().to_string();
    let mut seen = HashSet::new();
    let mut mints = Vec::new();

    for balance in post_balances {
        let owner = match &balance.owner {
            OptionSerializer::Some(owner) => owner.as_str(),
            _ => continue,
        };
        if owner != watched_account || balance.mint == native_mint {
            continue;
        }
        if seen.insert(balance.mint.clone()) {
            mints.push(balance.mint.clone());
        }
    }
    mints
}

struct InspectorWorker {
    rpc: Arc<RpcClient>,
    watched_account: String,
    state: Arc<SharedState>,
    enrichment: Arc<EnrichmentClient>,
    metrics: Arc<WatchMetrics>,
}

impl InspectorWorker {
    /// Fetch one transaction and register/enrich any watched mints in it
    async fn fetch_and_inspect(&self, signature: Signature) {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };

        let tx = match self.rpc.get_transaction_with_config(&signature, config).await {
            Ok(tx) => tx,
            Err(e) => {
                self.metrics.tx_fetch_errors.fetch_add(1, Ordering::Relaxed);
                self.state
                    .add_status_message(StatusMessage::new(
                        LogLevel::Warn,
                        format!("Error fetching transaction {signature}: {e}"),
                    ))
                    .await;
                return;
            }
        };
        self.metrics.tx_fetched.fetch_add(1, Ordering::Relaxed);

        let Some(meta) = tx.transaction.meta else {
            debug!("transaction {} has no meta", signature);
            return;
        };
        let OptionSerializer::Some(post_balances) = meta.post_token_balances else {
            return;
        };

        for mint in collect_watched_mints(&post_balances, &self.watched_account) {
            self.state
                .add_status_message(StatusMessage::new(
                    LogLevel::Info,
                    format!("========== New Token Found: {mint} =========="),
                ))
                .await;
            if self.state.add_mint(&mint) {
                self.metrics.mints_discovered.fetch_add(1, Ordering::Relaxed);
            }
            self.enrichment.spawn_fetch(mint).await;
        }
    }
}

/// Bounded signature queue plus the worker pool draining it
pub struct TransactionInspector {
    signature_tx: parking_lot::Mutex<Option<mpsc::Sender<Signature>>>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl TransactionInspector {
    /// Build the inspector and spawn its worker pool
    pub fn new(
        rpc_config: RpcConfig,
        watched_account: String,
        state: Arc<SharedState>,
        enrichment: Arc<EnrichmentClient>,
        metrics: Arc<WatchMetrics>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Self {
        let (signature_tx, signature_rx) = mpsc::channel(queue_capacity);
        let signature_rx = Arc::new(tokio::sync::Mutex::new(signature_rx));

        let worker = Arc::new(InspectorWorker {
            rpc: Arc::new(RpcClient::new_with_timeout(
                rpc_config.url,
                Duration::from_secs(rpc_config.timeout_secs),
            )),
            watched_account,
            state,
            enrichment,
            metrics,
        });

        let workers = (0..worker_count)
            .map(|id| {
                let worker = Arc::clone(&worker);
                let signature_rx = Arc::clone(&signature_rx);
                tokio::spawn(async move {
                    loop {
                        // Take the queue lock only for the dequeue; the
                        // fetch runs with other workers free to drain.
                        let signature = { signature_rx.lock().await.recv().await };
                        match signature {
                            Some(signature) => worker.fetch_and_inspect(signature).await,
                            None => {
                                debug!("inspector worker {id} exiting, queue closed");
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        Self {
            signature_tx: parking_lot::Mutex::new(Some(signature_tx)),
            workers: parking_lot::Mutex::new(workers),
        }
    }

    /// Test seam: an inspector whose queue is handed back to the caller
    /// instead of being drained by workers.
    #[doc(hidden)]
    pub fn without_workers(
        _rpc_config: RpcConfig,
        _watched_account: String,
        _state: Arc<SharedState>,
        _enrichment: Arc<EnrichmentClient>,
        _metrics: Arc<WatchMetrics>,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<Signature>) {
        let (signature_tx, signature_rx) = mpsc::channel(queue_capacity);
        (
            Self {
                signature_tx: parking_lot::Mutex::new(Some(signature_tx)),
                workers: parking_lot::Mutex::new(Vec::new()),
            },
            signature_rx,
        )
    }

    /// Enqueue a signature for inspection. Applies queue backpressure to
    /// the caller; enqueueing after shutdown is a no-op.
    pub async fn handle_transaction(&self, signature: Signature) {
        let tx = self.signature_tx.lock().clone();
        match tx {
            Some(tx) => {
                if tx.send(signature).await.is_err() {
                    warn!("inspector queue closed, signature dropped");
                }
            }
            None => warn!("inspector stopped, signature dropped"),
        }
    }

    /// Close the queue and wait for in-flight inspections to finish
    pub async fn shutdown(&self) {
        self.signature_tx.lock().take();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in workers {
            let _ = handle.await;
        }
    }
}
