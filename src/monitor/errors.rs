//! Error types and the reconnect backoff policy

use std::time::Duration;
use thiserror::Error;

/// Main error type for monitor operations
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("stream connection failed: {0}")]
    StreamConnect(String),

    #[error("log subscription failed: {0}")]
    StreamSubscribe(String),

    #[error("report request failed: {0}")]
    ReportTransport(#[from] reqwest::Error),

    #[error("report endpoint returned status {0}")]
    ReportStatus(u16),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Reconnect delay policy for the stream supervisor: starts at `initial`,
/// doubles per consecutive failure, capped at `max`. Deterministic - the
/// sequence for N failures is `min(initial * 2^(N-1), max)`.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial,
            initial,
            max,
        }
    }

    /// Delay to wait before the next attempt; doubles the internal state
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Reset after a fully successful connect+subscribe cycle
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}
