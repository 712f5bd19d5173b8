//! Non-blocking snapshot fan-out to consumer queues
//!
//! One producer, many independent subscribers (dashboard, bot, storage).
//! Publishing uses `try_send`: a consumer that is not keeping up loses the
//! update rather than stalling the pipeline.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

use crate::types::TokenSnapshot;

/// Fan-out hub for ordered `Vec<TokenSnapshot>` updates
#[derive(Debug, Default)]
pub struct TokenUpdateHub {
    subscribers: Mutex<Vec<mpsc::Sender<Vec<TokenSnapshot>>>>,
}

impl TokenUpdateHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new consumer queue with its own bounded capacity
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<Vec<TokenSnapshot>> {
        let (tx, rx) = mpsc::channel(capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Push an update to every subscriber without blocking.
    ///
    /// Closed subscribers are pruned. Returns how many subscribers missed
    /// the update because their queue was full.
    pub fn publish(&self, update: Vec<TokenSnapshot>) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut dropped = 0;

        subscribers.retain(|tx| match tx.try_send(update.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("token update subscriber gone, unsubscribing");
                false
            }
        });

        dropped
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(address: &str) -> Vec<TokenSnapshot> {
        vec![TokenSnapshot {
            symbol: "T".to_string(),
            address: address.to_string(),
            created_at: "00:00".to_string(),
            score: 1,
        }]
    }

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let hub = TokenUpdateHub::new();
        let mut rx1 = hub.subscribe(4);
        let mut rx2 = hub.subscribe(4);

        assert_eq!(hub.publish(snapshot("M1")), 0);
        assert_eq!(rx1.recv().await.unwrap()[0].address, "M1");
        assert_eq!(rx2.recv().await.unwrap()[0].address, "M1");
    }

    #[tokio::test]
    async fn full_subscriber_drops_without_blocking() {
        let hub = TokenUpdateHub::new();
        let _rx = hub.subscribe(1);

        assert_eq!(hub.publish(snapshot("M1")), 0);
        // Queue is now full; the second publish must drop, not block.
        assert_eq!(hub.publish(snapshot("M2")), 1);
    }

    #[tokio::test]
    async fn closed_subscriber_is_pruned() {
        let hub = TokenUpdateHub::new();
        let rx = hub.subscribe(1);
        drop(rx);

        hub.publish(snapshot("M1"));
        assert_eq!(hub.subscriber_count(), 0);
    }
}
