// Monitor pipeline components
pub mod app;        // Top-level wiring, run/stop lifecycle
pub mod enrichment; // Risk-report fetch: permit pool, retry, classification
pub mod errors;     // WatchError enum, ReconnectBackoff policy
pub mod handoff;    // Non-blocking snapshot fan-out to consumer queues
pub mod inspector;  // Worker pool fetching transactions, mint detection
pub mod processor;  // Log-event triage between stream and inspector
pub mod state;      // Lock-guarded mint/report/status state
pub mod status;     // StatusMessage and severity levels
pub mod stream;     // Pubsub subscription with supervised reconnect
pub mod telemetry;  // Atomic counters, snapshot export

// Re-export commonly used types
pub use app::App;
pub use enrichment::EnrichmentClient;
pub use errors::{ReconnectBackoff, WatchError};
pub use handoff::TokenUpdateHub;
pub use inspector::{collect_watched_mints, TransactionInspector};
pub use processor::EventProcessor;
pub use state::SharedState;
pub use status::{LogLevel, StatusMessage};
pub use stream::{LogEvent, StreamClient};
pub use telemetry::{MetricsSnapshot, WatchMetrics};
