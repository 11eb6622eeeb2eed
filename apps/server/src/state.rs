//! Application state management.

use crate::config::AppConfig;
use relay_alerts::{DispatchReport, DispatchStatus, Dispatcher, MessageSender, PreferenceStore};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Statistics for the relay.
#[derive(Debug, Default)]
pub struct RelayStats {
    /// Webhook payloads received.
    pub signals_received: AtomicU64,
    /// Signals that passed the filter and were fanned out.
    pub signals_processed: AtomicU64,
    /// Signals rejected by the filter.
    pub signals_filtered: AtomicU64,
    /// Signals missing required fields.
    pub signals_dropped: AtomicU64,
    /// Individual messages delivered.
    pub messages_delivered: AtomicU64,
    /// Start time in milliseconds.
    pub started_at_ms: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            started_at_ms: AtomicU64::new(now_ms()),
            ..Default::default()
        }
    }

    pub fn record_received(&self) {
        self.signals_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a finished dispatch by its status and delivered messages.
    pub fn record_report(&self, report: &DispatchReport) {
        let counter = match report.status {
            DispatchStatus::Processed => &self.signals_processed,
            DispatchStatus::Filtered(_) => &self.signals_filtered,
            DispatchStatus::Dropped(_) => &self.signals_dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.messages_delivered
            .fetch_add(report.sent_count() as u64, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        now_ms().saturating_sub(self.started_at_ms.load(Ordering::Relaxed)) / 1000
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            signals_received: self.signals_received.load(Ordering::Relaxed),
            signals_processed: self.signals_processed.load(Ordering::Relaxed),
            signals_filtered: self.signals_filtered.load(Ordering::Relaxed),
            signals_dropped: self.signals_dropped.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }
}

/// Summary of statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub signals_received: u64,
    pub signals_processed: u64,
    pub signals_filtered: u64,
    pub signals_dropped: u64,
    pub messages_delivered: u64,
    pub uptime_secs: u64,
}

/// Shared application state.
pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: Dispatcher,
    pub preferences: Arc<PreferenceStore>,
    pub stats: RelayStats,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        preferences: Arc<PreferenceStore>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        let dispatcher = Dispatcher::new(config.dispatcher_config(), Arc::clone(&preferences), sender);
        Self {
            config,
            dispatcher,
            preferences,
            stats: RelayStats::new(),
        }
    }

    pub fn stats_summary(&self) -> StatsSummary {
        self.stats.summary()
    }
}

/// Thread-safe shared state.
pub type SharedState = Arc<AppState>;

/// Create shared state.
pub fn create_state(
    config: AppConfig,
    preferences: Arc<PreferenceStore>,
    sender: Arc<dyn MessageSender>,
) -> SharedState {
    Arc::new(AppState::new(config, preferences, sender))
}
