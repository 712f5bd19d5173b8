//! mintwatch - Solana mint discovery and risk enrichment pipeline
//!
//! Watches a log stream for transactions mentioning a watched account,
//! detects newly created token mints, enriches each with a risk report,
//! and maintains a consistent in-memory view for downstream consumers.

pub mod config;
pub mod monitor;
pub mod notify;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use monitor::{App, SharedState};
pub use types::{Report, TokenSnapshot};
