//! Concurrency-safe store of per-mint report history and status history
//!
//! The single source of truth all other components read and write. All
//! access goes through the lock-guarded methods here; the guard is never
//! held across an await point.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::monitor::handoff::TokenUpdateHub;
use crate::monitor::status::{LogLevel, StatusMessage};
use crate::monitor::telemetry::WatchMetrics;
use crate::types::{Report, TokenSnapshot};

#[derive(Debug, Default)]
struct StateInner {
    /// Append-only report history per mint
    mint_state: HashMap<String, Vec<Report>>,
    /// Mint first-sighting order, for the snapshot tie-break
    mint_order: Vec<String>,
    /// Capped status history, oldest dropped first
    status_history: VecDeque<StatusMessage>,
}

/// Shared application state behind one RwLock
pub struct SharedState {
    inner: RwLock<StateInner>,
    status_tx: mpsc::Sender<StatusMessage>,
    status_history_cap: usize,
    metrics: Arc<WatchMetrics>,
}

impl SharedState {
    pub fn new(
        status_tx: mpsc::Sender<StatusMessage>,
        status_history_cap: usize,
        metrics: Arc<WatchMetrics>,
    ) -> Self {
        Self {
            inner: RwLock::new(StateInner::default()),
            status_tx,
            status_history_cap,
            metrics,
        }
    }

    /// Register a mint with an empty history. Idempotent - a mint that is
    /// already known is left untouched. Returns whether the mint was new.
    pub fn add_mint(&self, mint: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.mint_state.contains_key(mint) {
            return false;
        }
        inner.mint_state.insert(mint.to_string(), Vec::new());
        inner.mint_order.push(mint.to_string());
        true
    }

    /// Append a report to a mint's history. Never replaces or truncates.
    pub fn update_mint_state(&self, mint: &str, report: Report) {
        let mut inner = self.inner.write();
        if !inner.mint_state.contains_key(mint) {
            inner.mint_order.push(mint.to_string());
        }
        inner
            .mint_state
            .entry(mint.to_string())
            .or_default()
            .push(report);
    }

    /// Load persisted history at startup. Reports are ordered by detection
    /// time within each mint; mints by their earliest report.
    pub fn seed(&self, mut history: HashMap<String, Vec<Report>>) {
        for reports in history.values_mut() {
            reports.sort_by_key(|r| r.detected_at);
        }
        let mut mints: Vec<(String, Vec<Report>)> = history.into_iter().collect();
        mints.sort_by_key(|(_, reports)| reports.first().map(|r| r.detected_at));

        let mut inner = self.inner.write();
        for (mint, reports) in mints {
            if !inner.mint_state.contains_key(&mint) {
                inner.mint_order.push(mint.clone());
            }
            inner.mint_state.entry(mint).or_default().extend(reports);
        }
    }

    /// Build the consumer projection: latest report per mint, ascending by
    /// detection time, first-sighting order on ties.
    pub fn token_snapshots(&self) -> Vec<TokenSnapshot> {
        let inner = self.inner.read();
        let mut rows: Vec<(chrono::DateTime<chrono::Utc>, TokenSnapshot)> = inner
            .mint_order
            .iter()
            .filter_map(|mint| {
                let latest = inner.mint_state.get(mint)?.last()?;
                Some((latest.detected_at, TokenSnapshot::from_latest(mint, latest)))
            })
            .collect();
        // sort_by_key is stable, so equal timestamps keep insertion order
        rows.sort_by_key(|(detected_at, _)| *detected_at);
        rows.into_iter().map(|(_, snapshot)| snapshot).collect()
    }

    /// Compute a fresh snapshot and publish it through the hub. Never
    /// blocks: a slow consumer loses the update and a Warn status is
    /// recorded instead.
    pub async fn send_token_updates(&self, hub: &TokenUpdateHub) {
        let snapshots = self.token_snapshots();
        let dropped = hub.publish(snapshots);
        if dropped > 0 {
            self.metrics
                .snapshots_dropped
                .fetch_add(dropped as u64, std::sync::atomic::Ordering::Relaxed);
            self.add_status_message(StatusMessage::new(
                LogLevel::Warn,
                format!("token update dropped for {dropped} slow consumer(s)"),
            ))
            .await;
        }
    }

    /// Append to the status history and forward to the outbound status
    /// channel. The channel send may briefly block when the sink is full;
    /// a closed sink (shutdown) is not an error.
    pub async fn add_status_message(&self, msg: StatusMessage) {
        {
            let mut inner = self.inner.write();
            if inner.status_history.len() >= self.status_history_cap {
                inner.status_history.pop_front();
            }
            inner.status_history.push_back(msg.clone());
        }
        let _ = self.status_tx.send(msg).await;
    }

    /// Full ordered status history
    pub fn status_history(&self) -> Vec<StatusMessage> {
        self.inner.read().status_history.iter().cloned().collect()
    }

    /// Copy of the full mint map
    pub fn mint_state(&self) -> HashMap<String, Vec<Report>> {
        self.inner.read().mint_state.clone()
    }

    /// Number of reports recorded for a mint, if known
    pub fn report_count(&self, mint: &str) -> Option<usize> {
        self.inner.read().mint_state.get(mint).map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn test_state() -> (Arc<SharedState>, mpsc::Receiver<StatusMessage>) {
        let (status_tx, status_rx) = mpsc::channel(64);
        let state = Arc::new(SharedState::new(
            status_tx,
            1000,
            Arc::new(WatchMetrics::new()),
        ));
        (state, status_rx)
    }

    fn report_at(secs: i64, score: i64) -> Report {
        let mut report = Report::default();
        report.detected_at = Utc.timestamp_opt(secs, 0).unwrap();
        report.score = score;
        report
    }

    #[test]
    fn add_mint_is_idempotent() {
        let (state, _rx) = test_state();
        state.add_mint("M1");
        state.add_mint("M1");
        state.add_mint("M1");
        assert_eq!(state.mint_state().len(), 1);
        assert_eq!(state.report_count("M1"), Some(0));
    }

    #[test]
    fn add_mint_does_not_truncate_history() {
        let (state, _rx) = test_state();
        state.add_mint("M1");
        state.update_mint_state("M1", report_at(1, 100));
        state.add_mint("M1");
        assert_eq!(state.report_count("M1"), Some(1));
    }

    #[test]
    fn update_appends_in_order() {
        let (state, _rx) = test_state();
        state.add_mint("M1");
        state.update_mint_state("M1", report_at(1, 100));
        state.update_mint_state("M1", report_at(2, 200));

        let history = &state.mint_state()["M1"];
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].score, 100);
        assert_eq!(history[1].score, 200);
    }

    #[test]
    fn concurrent_updates_stay_attributed() {
        let (state, _rx) = test_state();
        let mints: Vec<String> = (0..8).map(|i| format!("M{i}")).collect();
        for mint in &mints {
            state.add_mint(mint);
        }

        std::thread::scope(|scope| {
            for (i, mint) in mints.iter().enumerate() {
                let state = &state;
                scope.spawn(move || {
                    for j in 0..50 {
                        state.update_mint_state(mint, report_at(j, i as i64));
                    }
                });
            }
        });

        let map = state.mint_state();
        for (i, mint) in mints.iter().enumerate() {
            let history = &map[mint];
            assert_eq!(history.len(), 50);
            assert!(history.iter().all(|r| r.score == i as i64));
        }
    }

    #[test]
    fn snapshots_sort_by_detection_time_then_insertion() {
        let (state, _rx) = test_state();
        for mint in ["A", "B", "C"] {
            state.add_mint(mint);
        }
        state.update_mint_state("A", report_at(30, 1));
        state.update_mint_state("B", report_at(10, 2));
        state.update_mint_state("C", report_at(10, 3));

        let addresses: Vec<String> = state
            .token_snapshots()
            .into_iter()
            .map(|s| s.address)
            .collect();
        // B and C tie on time; B was inserted first
        assert_eq!(addresses, vec!["B", "C", "A"]);
    }

    #[test]
    fn unenriched_mints_are_omitted_from_snapshots() {
        let (state, _rx) = test_state();
        state.add_mint("M1");
        state.add_mint("M2");
        state.update_mint_state("M2", report_at(1, 9));
        let snapshots = state.token_snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].address, "M2");
    }

    #[tokio::test]
    async fn full_hub_subscriber_warns_instead_of_blocking() {
        let (state, _status_rx) = test_state();
        state.add_mint("M1");
        state.update_mint_state("M1", report_at(1, 5));

        let hub = TokenUpdateHub::new();
        let _rx = hub.subscribe(1);

        state.send_token_updates(&hub).await;
        state.send_token_updates(&hub).await;

        let warns: Vec<StatusMessage> = state
            .status_history()
            .into_iter()
            .filter(|m| m.level == LogLevel::Warn)
            .collect();
        assert_eq!(warns.len(), 1);
        assert!(warns[0].text.contains("dropped"));
    }

    #[tokio::test]
    async fn status_history_is_capped() {
        let (status_tx, mut status_rx) = mpsc::channel(512);
        let state = SharedState::new(status_tx, 3, Arc::new(WatchMetrics::new()));
        for i in 0..5 {
            state
                .add_status_message(StatusMessage::new(LogLevel::Info, format!("m{i}")))
                .await;
        }
        let history = state.status_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].text, "m2");
        assert_eq!(history[2].text, "m4");
        // All five were still forwarded to the channel
        for i in 0..5 {
            assert_eq!(status_rx.recv().await.unwrap().text, format!("m{i}"));
        }
    }

    #[test]
    fn seed_orders_reports_and_mints() {
        let (state, _rx) = test_state();
        let mut history = HashMap::new();
        history.insert("LATE".to_string(), vec![report_at(100, 1)]);
        history.insert("EARLY".to_string(), vec![report_at(20, 3), report_at(5, 2)]);
        state.seed(history);

        let map = state.mint_state();
        assert_eq!(map["EARLY"][0].detected_at, Utc.timestamp_opt(5, 0).unwrap());

        let addresses: Vec<String> = state
            .token_snapshots()
            .into_iter()
            .map(|s| s.address)
            .collect();
        assert_eq!(addresses, vec!["EARLY", "LATE"]);
    }

    proptest! {
        #[test]
        fn add_mint_sequences_leave_one_entry_per_mint(
            calls in proptest::collection::vec(0usize..4, 1..40)
        ) {
            let (state, _rx) = test_state();
            for idx in &calls {
                state.add_mint(&format!("M{idx}"));
            }
            let map = state.mint_state();
            let distinct: std::collections::HashSet<&usize> = calls.iter().collect();
            prop_assert_eq!(map.len(), distinct.len());
            for reports in map.values() {
                prop_assert!(reports.is_empty());
            }
        }
    }
}
