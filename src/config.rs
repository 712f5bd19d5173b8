//! Configuration loading from TOML files and environment variables
//!
//! One `Config` is constructed at startup and passed by reference into each
//! component's constructor; nothing reads the environment after that.
//! Missing stream credentials are a fatal startup error.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log stream subscription
    pub stream: StreamConfig,

    /// Transaction RPC access
    pub rpc: RpcConfig,

    /// Queue and worker sizing
    pub pipeline: PipelineConfig,

    /// Risk-report enrichment
    pub enrichment: EnrichmentConfig,

    /// Report persistence
    pub storage: StorageConfig,

    /// Outbound notifications
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// WebSocket endpoint; the API key is appended to form the full URL
    pub websocket_url: String,

    /// Provider API key
    pub api_key: String,

    /// Account whose post-transaction balances are scanned for new mints
    pub watched_account: String,

    /// Initial reconnect backoff in seconds
    #[serde(default = "default_backoff_initial_secs")]
    pub backoff_initial_secs: u64,

    /// Reconnect backoff cap in seconds
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// HTTP RPC endpoint for transaction fetches
    pub url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the raw log-event queue
    pub event_queue_capacity: usize,

    /// Capacity of the outbound status channel
    pub status_channel_capacity: usize,

    /// Retained status history length
    pub status_history_cap: usize,

    /// Transaction inspection workers
    pub inspector_workers: usize,

    /// Capacity of the signature work queue feeding the workers
    pub inspector_queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Base URL of the risk-report service
    pub report_api_url: String,

    /// Concurrent report fetches
    pub max_concurrent_requests: usize,

    /// Total fetch attempts per trigger
    pub fetch_attempts: usize,

    /// Base delay between attempts in milliseconds; the Nth wait is N times
    /// this value
    pub retry_base_delay_ms: u64,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Scores strictly above this are discarded as high-risk
    pub high_risk_score: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the embedded report database; empty disables persistence
    pub db_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Discord webhook URL; empty disables the webhook sink
    pub discord_webhook_url: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            websocket_url: String::new(),
            api_key: String::new(),
            watched_account: String::new(),
            backoff_initial_secs: default_backoff_initial_secs(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 100,
            status_channel_capacity: 100,
            status_history_cap: 1000,
            inspector_workers: 8,
            inspector_queue_capacity: 256,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            report_api_url: "https://api.rugcheck.xyz".to_string(),
            max_concurrent_requests: 10,
            fetch_attempts: 3,
            retry_base_delay_ms: 1000,
            timeout_secs: 10,
            high_risk_score: 8000,
        }
    }
}

fn default_backoff_initial_secs() -> u64 {
    1
}

fn default_backoff_max_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("failed to read config file: {}", e))?;
        let config: Config =
            toml::from_str(&contents).map_err(|e| anyhow!("failed to parse TOML config: {}", e))?;
        Ok(config)
    }

    /// Apply environment variable overrides. Variable names follow the
    /// deployment convention: WEBSOCKET_URL, API_KEY, WATCHED_ACCOUNT,
    /// RPC_URL, REPORT_API_URL, DB_PATH, DISCORD_WEBHOOK_URL.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("WEBSOCKET_URL") {
            self.stream.websocket_url = url;
        }
        if let Ok(key) = std::env::var("API_KEY") {
            self.stream.api_key = key;
        }
        if let Ok(account) = std::env::var("WATCHED_ACCOUNT") {
            self.stream.watched_account = account;
        }
        if let Ok(url) = std::env::var("RPC_URL") {
            self.rpc.url = url;
        }
        if let Ok(url) = std::env::var("REPORT_API_URL") {
            self.enrichment.report_api_url = url;
        }
        if let Ok(path) = std::env::var("DB_PATH") {
            self.storage.db_path = path;
        }
        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            self.notify.discord_webhook_url = url;
        }
    }

    /// Validate configuration. Failures here abort startup.
    pub fn validate(&self) -> Result<()> {
        if self.stream.websocket_url.is_empty() {
            return Err(anyhow!("stream.websocket_url is required"));
        }
        if self.stream.api_key.is_empty() {
            return Err(anyhow!("stream.api_key is required"));
        }
        if self.stream.watched_account.is_empty() {
            return Err(anyhow!("stream.watched_account is required"));
        }
        Pubkey::from_str(&self.stream.watched_account)
            .map_err(|e| anyhow!("stream.watched_account is not a valid pubkey: {}", e))?;
        if self.enrichment.report_api_url.is_empty() {
            return Err(anyhow!("enrichment.report_api_url is required"));
        }
        if self.stream.backoff_initial_secs == 0 {
            return Err(anyhow!("stream.backoff_initial_secs must be > 0"));
        }
        if self.stream.backoff_max_secs < self.stream.backoff_initial_secs {
            return Err(anyhow!(
                "stream.backoff_max_secs must be >= stream.backoff_initial_secs"
            ));
        }
        if self.pipeline.event_queue_capacity == 0 {
            return Err(anyhow!("pipeline.event_queue_capacity must be > 0"));
        }
        if self.pipeline.status_channel_capacity == 0 {
            return Err(anyhow!("pipeline.status_channel_capacity must be > 0"));
        }
        if self.pipeline.inspector_workers == 0 {
            return Err(anyhow!("pipeline.inspector_workers must be > 0"));
        }
        if self.pipeline.inspector_queue_capacity == 0 {
            return Err(anyhow!("pipeline.inspector_queue_capacity must be > 0"));
        }
        if self.enrichment.max_concurrent_requests == 0 {
            return Err(anyhow!("enrichment.max_concurrent_requests must be > 0"));
        }
        if self.enrichment.fetch_attempts == 0 {
            return Err(anyhow!("enrichment.fetch_attempts must be > 0"));
        }
        Ok(())
    }

    /// Load from an optional file, apply env overrides, validate
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }
}
