//! Common types used throughout the application
//!
//! The report types mirror the JSON contract of the risk-report endpoint
//! (`GET /v1/tokens/{mint}/report`); wire names are camelCase.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token metadata section of a report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub update_authority: String,
}

/// A single named risk with its severity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub level: String,
}

/// A top-holder entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holder {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub decimals: i32,
    #[serde(default)]
    pub pct: f64,
    #[serde(default)]
    pub ui_amount: f64,
    #[serde(default)]
    pub ui_amount_string: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub insider: bool,
}

/// An account the report service already knows about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownAccount {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Known accounts keyed by address
pub type KnownAccounts = HashMap<String, KnownAccount>;

/// Enrichment result for one mint at one point in time.
///
/// Immutable once produced; a mint accumulates an append-only history of
/// these, ordered by `detected_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub token_meta: TokenMeta,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub total_market_liquidity: f64,
    #[serde(default, rename = "totalLPProviders")]
    pub total_lp_providers: i64,
    #[serde(default)]
    pub rugged: bool,
    #[serde(default)]
    pub known_accounts: KnownAccounts,
    #[serde(default)]
    pub verification: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub freeze_authority: String,
    #[serde(default)]
    pub mint_authority: String,
    #[serde(default)]
    pub top_holders: Vec<Holder>,
    /// Stamped locally when the endpoint omits it
    #[serde(default = "Utc::now")]
    pub detected_at: DateTime<Utc>,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            token_meta: TokenMeta::default(),
            risks: Vec::new(),
            total_market_liquidity: 0.0,
            total_lp_providers: 0,
            rugged: false,
            known_accounts: KnownAccounts::default(),
            verification: String::new(),
            score: 0,
            freeze_authority: String::new(),
            mint_authority: String::new(),
            top_holders: Vec::new(),
            detected_at: Utc::now(),
        }
    }
}

/// Derived, read-only projection of the latest report per mint.
///
/// Rebuilt on demand for consumers; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub symbol: String,
    pub address: String,
    /// Local wall-clock time of the latest report, `HH:MM`
    pub created_at: String,
    pub score: i64,
}

impl TokenSnapshot {
    /// Build the projection for one mint from its latest report
    pub fn from_latest(mint: &str, latest: &Report) -> Self {
        Self {
            symbol: latest.token_meta.symbol.clone(),
            address: mint.to_string(),
            created_at: latest
                .detected_at
                .with_timezone(&Local)
                .format("%H:%M")
                .to_string(),
            score: latest.score,
        }
    }
}
