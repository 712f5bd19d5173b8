//! Log stream subscription with supervised reconnect
//!
//! Owns the long-lived pubsub connection, subscribes to logs mentioning the
//! watched account, and forwards decoded events into the bounded event
//! queue. The supervisor loop reconnects with exponential backoff and exits
//! only on shutdown; transport errors are never fatal to the process.

use futures_util::StreamExt;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter};
use solana_client::rpc_response::{Response, RpcLogsResponse};
use solana_sdk::commitment_config::CommitmentConfig;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::monitor::errors::{ReconnectBackoff, WatchError};
use crate::monitor::state::SharedState;
use crate::monitor::status::{LogLevel, StatusMessage};
use crate::monitor::telemetry::WatchMetrics;

/// Owned copy of one log notification, decoupled from the pubsub types
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub signature: String,
    /// Transaction-level error, if the transaction failed
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub slot: u64,
}

impl LogEvent {
    /// Decode a pubsub notification into an owned event
    pub fn from_response(response: Response<RpcLogsResponse>) -> Self {
        Self {
            signature: response.value.signature,
            err: response.value.err.map(|e| e.to_string()),
            logs: response.value.logs,
            slot: response.context.slot,
        }
    }
}

/// Client for the log-streaming endpoint
pub struct StreamClient {
    config: StreamConfig,
    commitment: CommitmentConfig,
    event_tx: mpsc::Sender<LogEvent>,
    state: Arc<SharedState>,
    metrics: Arc<WatchMetrics>,
}

impl StreamClient {
    pub fn new(
        config: StreamConfig,
        event_tx: mpsc::Sender<LogEvent>,
        state: Arc<SharedState>,
        metrics: Arc<WatchMetrics>,
    ) -> Self {
        Self {
            config,
            commitment: CommitmentConfig::confirmed(),
            event_tx,
            state,
            metrics,
        }
    }

    async fn status(&self, level: LogLevel, text: String) {
        self.state.add_status_message(StatusMessage::new(level, text)).await;
    }

    /// Open a single transport connection to the streaming endpoint
    pub async fn connect(&self) -> Result<Arc<PubsubClient>, WatchError> {
        self.status(LogLevel::Info, "Connecting to stream...".to_string())
            .await;
        debug!("connecting to {}", self.config.websocket_url);

        let url = format!("{}{}", self.config.websocket_url, self.config.api_key);
        match PubsubClient::new(&url).await {
            Ok(client) => {
                self.status(LogLevel::Info, "Stream connected".to_string())
                    .await;
                Ok(Arc::new(client))
            }
            Err(e) => {
                self.status(
                    LogLevel::Error,
                    format!("Failed to connect to stream: {e}"),
                )
                .await;
                Err(WatchError::StreamConnect(e.to_string()))
            }
        }
    }

    /// Register interest in logs mentioning the watched account and spawn
    /// the receive loop.
    ///
    /// The subscription stream borrows the pubsub client, so it is built
    /// inside the spawned task which owns the client; the subscription
    /// outcome is reported back through a oneshot so failures surface here.
    /// Returns the receive-loop handle; the loop ends on shutdown, on a
    /// closed event queue, or when the stream itself dies.
    pub async fn subscribe(
        &self,
        client: Arc<PubsubClient>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, WatchError> {
        self.status(LogLevel::Info, "Subscribing to logs...".to_string())
            .await;

        let mentions = self.config.watched_account.clone();
        let commitment = self.commitment;
        let event_tx = self.event_tx.clone();
        let state = Arc::clone(&self.state);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), WatchError>>();

        let handle = tokio::spawn(async move {
            let mut shutdown = shutdown;
            let filter = RpcTransactionLogsFilter::Mentions(vec![mentions]);
            let config = RpcTransactionLogsConfig {
                commitment: Some(commitment),
            };

            let (mut notifications, unsubscribe) =
                match client.logs_subscribe(filter, config).await {
                    Ok(subscription) => {
                        let _ = ready_tx.send(Ok(()));
                        subscription
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(WatchError::StreamSubscribe(e.to_string())));
                        return;
                    }
                };

            loop {
                tokio::select! {
                    _ = async { let _ = shutdown.wait_for(|&stop| stop).await; } => {
                        debug!("receive loop stopping on shutdown");
                        break;
                    }
                    next = notifications.next() => match next {
                        Some(response) => {
                            let event = LogEvent::from_response(response);
                            tokio::select! {
                                _ = async { let _ = shutdown.wait_for(|&stop| stop).await; } => break,
                                sent = event_tx.send(event) => {
                                    if sent.is_err() {
                                        warn!("event queue closed, receive loop exiting");
                                        break;
                                    }
                                }
                            }
                        }
                        None => {
                            state
                                .add_status_message(StatusMessage::new(
                                    LogLevel::Error,
                                    "Stream ended".to_string(),
                                ))
                                .await;
                            break;
                        }
                    }
                }
            }
            unsubscribe().await;
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                self.status(LogLevel::Info, "Start monitoring...".to_string())
                    .await;
                Ok(handle)
            }
            Ok(Err(e)) => {
                self.status(LogLevel::Error, format!("Failed to subscribe to logs: {e}"))
                    .await;
                Err(e)
            }
            Err(_) => Err(WatchError::StreamSubscribe(
                "subscription task ended before reporting readiness".to_string(),
            )),
        }
    }

    /// Supervisory loop: connect + subscribe, back off on failure (doubling
    /// from the configured initial up to the cap, reset after a fully
    /// successful cycle), reconnect when the live stream dies. Exits only
    /// when the shutdown signal fires.
    pub async fn run_with_reconnect(&self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = ReconnectBackoff::new(
            Duration::from_secs(self.config.backoff_initial_secs),
            Duration::from_secs(self.config.backoff_max_secs),
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let connected = tokio::select! {
                _ = shutdown.wait_for(|&stop| stop) => break,
                connected = self.connect() => connected,
            };

            let receive_shutdown = shutdown.clone();
            let receive_loop = match connected {
                Ok(client) => {
                    tokio::select! {
                        _ = shutdown.wait_for(|&stop| stop) => break,
                        subscribed = self.subscribe(client, receive_shutdown) => subscribed,
                    }
                }
                Err(e) => Err(e),
            };

            match receive_loop {
                Ok(handle) => {
                    backoff.reset();
                    // Ends on shutdown or when the stream dies
                    let _ = handle.await;
                    if *shutdown.borrow() {
                        break;
                    }
                    self.metrics.reconnect_count.fetch_add(1, Ordering::Relaxed);
                    self.status(
                        LogLevel::Warn,
                        "Stream disconnected, reconnecting...".to_string(),
                    )
                    .await;
                }
                Err(_) => {
                    self.metrics.reconnect_count.fetch_add(1, Ordering::Relaxed);
                    let delay = backoff.next_delay();
                    self.status(
                        LogLevel::Error,
                        format!("Retrying connection in {}s...", delay.as_secs()),
                    )
                    .await;
                    tokio::select! {
                        _ = shutdown.wait_for(|&stop| stop) => break,
                        _ = sleep(delay) => {}
                    }
                }
            }
        }
        info!("stream supervisor stopped");
    }
}
