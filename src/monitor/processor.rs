//! Log-event triage between stream decoding and transaction inspection
//!
//! Holds no state and performs no I/O beyond status emission; failed
//! transactions stop here.

use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::monitor::inspector::TransactionInspector;
use crate::monitor::state::SharedState;
use crate::monitor::status::{LogLevel, StatusMessage};
use crate::monitor::stream::LogEvent;
use crate::monitor::telemetry::WatchMetrics;

pub struct EventProcessor {
    inspector: Arc<TransactionInspector>,
    state: Arc<SharedState>,
    metrics: Arc<WatchMetrics>,
}

impl EventProcessor {
    pub fn new(
        inspector: Arc<TransactionInspector>,
        state: Arc<SharedState>,
        metrics: Arc<WatchMetrics>,
    ) -> Self {
        Self {
            inspector,
            state,
            metrics,
        }
    }

    /// Triage one log event: drop failed transactions, parse the signature,
    /// hand off to the inspector queue.
    pub async fn process_log(&self, event: LogEvent) {
        self.metrics.logs_received.fetch_add(1, Ordering::Relaxed);

        if let Some(err) = &event.err {
            self.metrics.failed_tx_events.fetch_add(1, Ordering::Relaxed);
            self.state
                .add_status_message(StatusMessage::new(
                    LogLevel::Error,
                    format!("Transaction failed: {err}"),
                ))
                .await;
            return;
        }

        let signature = match Signature::from_str(&event.signature) {
            Ok(signature) => signature,
            Err(e) => {
                self.state
                    .add_status_message(StatusMessage::new(
                        LogLevel::Warn,
                        format!("Unparseable signature {}: {e}", event.signature),
                    ))
                    .await;
                return;
            }
        };

        self.state
            .add_status_message(StatusMessage::new(
                LogLevel::Info,
                format!("Transaction signature: {signature}"),
            ))
            .await;

        self.inspector.handle_transaction(signature).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnrichmentConfig, RpcConfig};
    use crate::monitor::enrichment::EnrichmentClient;
    use crate::monitor::handoff::TokenUpdateHub;
    use tokio::sync::mpsc;

    fn test_processor() -> (
        EventProcessor,
        Arc<SharedState>,
        mpsc::Receiver<Signature>,
    ) {
        let (status_tx, _status_rx) = mpsc::channel(64);
        let metrics = Arc::new(WatchMetrics::new());
        let state = Arc::new(SharedState::new(status_tx, 100, Arc::clone(&metrics)));
        let hub = Arc::new(TokenUpdateHub::new());
        let enrichment = Arc::new(
            EnrichmentClient::new(
                EnrichmentConfig::default(),
                Arc::clone(&state),
                Arc::clone(&hub),
                Vec::new(),
                None,
                Arc::clone(&metrics),
            )
            .unwrap(),
        );
        let (inspector, signature_rx) = TransactionInspector::without_workers(
            RpcConfig::default(),
            "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1".to_string(),
            Arc::clone(&state),
            enrichment,
            Arc::clone(&metrics),
            8,
        );
        let processor = EventProcessor::new(Arc::new(inspector), Arc::clone(&state), metrics);
        (processor, state, signature_rx)
    }

    fn event(signature: &str, err: Option<&str>) -> LogEvent {
        LogEvent {
            signature: signature.to_string(),
            err: err.map(str::to_string),
            logs: Vec::new(),
            slot: 1,
        }
    }

    #[tokio::test]
    async fn failed_transactions_stop_at_triage() {
        let (processor, state, mut signature_rx) = test_processor();
        processor
            .process_log(event(&Signature::default().to_string(), Some("InstructionError")))
            .await;

        assert!(signature_rx.try_recv().is_err());
        let history = state.status_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].level, LogLevel::Error);
        assert!(history[0].text.contains("Transaction failed"));
    }

    #[tokio::test]
    async fn successful_events_reach_the_inspector_queue() {
        let (processor, _state, mut signature_rx) = test_processor();
        let signature = Signature::default();
        processor
            .process_log(event(&signature.to_string(), None))
            .await;

        assert_eq!(signature_rx.recv().await.unwrap(), signature);
    }

    #[tokio::test]
    async fn garbage_signatures_are_skipped_with_a_warning() {
        let (processor, state, mut signature_rx) = test_processor();
        processor.process_log(event("not-base58!!", None)).await;

        assert!(signature_rx.try_recv().is_err());
        let history = state.status_history();
        assert_eq!(history.last().unwrap().level, LogLevel::Warn);
    }
}
