//! Outbound notification sinks for accepted reports
//!
//! The enrichment pipeline fans each accepted report out to every
//! configured sink; sink failures never propagate back into the pipeline.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::monitor::state::SharedState;
use crate::monitor::status::{LogLevel, StatusMessage};
use crate::types::Report;

/// A consumer of accepted reports (chat bot, webhook, ...)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, mint: &str, report: &Report);
}

/// Sink that logs accepted reports through tracing
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, mint: &str, report: &Report) {
        info!(
            mint = %mint,
            symbol = %report.token_meta.symbol,
            score = %report.score,
            "report accepted"
        );
    }
}

/// Discord webhook sink posting an embed per accepted report
pub struct DiscordWebhookNotifier {
    http: reqwest::Client,
    webhook_url: String,
    state: Arc<SharedState>,
}

impl DiscordWebhookNotifier {
    pub fn new(http: reqwest::Client, webhook_url: String, state: Arc<SharedState>) -> Self {
        Self {
            http,
            webhook_url,
            state,
        }
    }

    fn payload(&self, mint: &str, report: &Report) -> serde_json::Value {
        json!({
            "username": "Report Bot",
            "content": report.token_meta.name,
            "embeds": [{
                "title": "Report Details",
                "description": format!("Details of the report for {}", report.token_meta.name),
                "url": format!("https://rugcheck.xyz/tokens/{mint}"),
                "fields": [
                    {"name": "Score", "value": report.score.to_string(), "inline": true},
                    {"name": "Total Market Liquidity", "value": format!("{:.2}", report.total_market_liquidity), "inline": true},
                    {"name": "Total LP Providers", "value": report.total_lp_providers.to_string(), "inline": true},
                    {"name": "Rugged", "value": report.rugged.to_string(), "inline": true},
                    {"name": "Verification", "value": report.verification.clone(), "inline": true},
                ],
            }],
        })
    }

    async fn status(&self, level: LogLevel, text: String) {
        self.state.add_status_message(StatusMessage::new(level, text)).await;
    }
}

#[async_trait]
impl Notifier for DiscordWebhookNotifier {
    async fn notify(&self, mint: &str, report: &Report) {
        let payload = self.payload(mint, report);
        match self.http.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                self.status(
                    LogLevel::Warn,
                    format!("Webhook rejected report for {mint}: {}", response.status()),
                )
                .await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("webhook delivery failed: {e}");
                self.status(LogLevel::Warn, format!("Error sending webhook: {e}"))
                    .await;
            }
        }
    }
}
