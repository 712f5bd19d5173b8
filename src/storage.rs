//! Durable report history
//!
//! Narrow persistence seam: append a report, or load everything to seed
//! the in-memory state at startup. Keys are `mint \0 sequence` so one
//! prefix scan recovers a mint's history in insertion order.

use std::collections::HashMap;
use std::path::Path;

use crate::monitor::errors::WatchError;
use crate::types::Report;

/// Persistence collaborator for the enrichment pipeline
pub trait ReportStore: Send + Sync {
    /// Durably append one report for a mint
    fn add_report(&self, mint: &str, report: &Report) -> Result<(), WatchError>;

    /// Full historical mint state, for seeding shared state at startup
    fn load(&self) -> Result<HashMap<String, Vec<Report>>, WatchError>;
}

/// Embedded sled-backed store
pub struct SledReportStore {
    db: sled::Db,
}

impl SledReportStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WatchError> {
        let db = sled::open(path).map_err(|e| WatchError::Storage(e.to_string()))?;
        Ok(Self { db })
    }

    /// In-memory store for tests
    #[doc(hidden)]
    pub fn temporary() -> Result<Self, WatchError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| WatchError::Storage(e.to_string()))?;
        Ok(Self { db })
    }

    fn key(mint: &str, seq: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(mint.len() + 9);
        key.extend_from_slice(mint.as_bytes());
        key.push(0);
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }
}

impl ReportStore for SledReportStore {
    fn add_report(&self, mint: &str, report: &Report) -> Result<(), WatchError> {
        let seq = self
            .db
            .generate_id()
            .map_err(|e| WatchError::Storage(e.to_string()))?;
        let value =
            serde_json::to_vec(report).map_err(|e| WatchError::Storage(e.to_string()))?;
        self.db
            .insert(Self::key(mint, seq), value)
            .map_err(|e| WatchError::Storage(e.to_string()))?;
        Ok(())
    }

    fn load(&self) -> Result<HashMap<String, Vec<Report>>, WatchError> {
        let mut state: HashMap<String, Vec<Report>> = HashMap::new();
        for entry in self.db.iter() {
            let (key, value) = entry.map_err(|e| WatchError::Storage(e.to_string()))?;
            let Some(split) = key.iter().position(|&b| b == 0) else {
                continue;
            };
            let mint = String::from_utf8_lossy(&key[..split]).to_string();
            let report: Report = serde_json::from_slice(&value)
                .map_err(|e| WatchError::Storage(e.to_string()))?;
            state.entry(mint).or_default().push(report);
        }
        Ok(state)
    }
}
