//! Signal dispatch: normalize, filter, format once, fan out to recipients.

use crate::format::format_signal;
use crate::preferences::{PreferenceStore, RecipientId};
use crate::sender::MessageSender;
use futures_util::future::join_all;
use relay_core::{
    normalize, FilterRejection, MessageCategory, NormalizeError, NormalizedSignal, RawSignal,
    SignalFilter,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Static dispatch configuration.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Authorized recipients, in delivery order.
    pub recipients: Vec<RecipientId>,
    /// Allow-lists and action policy.
    pub filter: SignalFilter,
}

/// Why a recipient did or did not get the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    BlockedByPreference,
    FilteredBeforeDispatch,
    DeliveryError(String),
}

/// Outcome for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub recipient_id: RecipientId,
    pub delivered: bool,
    pub outcome: DeliveryOutcome,
}

impl DispatchResult {
    fn new(recipient_id: RecipientId, outcome: DeliveryOutcome) -> Self {
        Self {
            recipient_id,
            delivered: outcome == DeliveryOutcome::Sent,
            outcome,
        }
    }
}

/// Overall fate of a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Passed the filter and was fanned out.
    Processed,
    /// Normalized but rejected by policy.
    Filtered(FilterRejection),
    /// Could not be normalized.
    Dropped(NormalizeError),
}

/// Aggregated result of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub status: DispatchStatus,
    /// Normalized signal, if normalization succeeded.
    pub signal: Option<NormalizedSignal>,
    /// Formatted message, if the signal reached the fan-out.
    pub message: Option<String>,
    /// Per-recipient outcomes, in configured recipient order.
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    fn dropped(reason: NormalizeError) -> Self {
        Self {
            status: DispatchStatus::Dropped(reason),
            signal: None,
            message: None,
            results: Vec::new(),
        }
    }

    pub fn processed(&self) -> bool {
        self.status == DispatchStatus::Processed
    }

    pub fn sent_count(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::Sent))
    }

    pub fn blocked_count(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::BlockedByPreference))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::DeliveryError(_)))
    }

    fn count(&self, pred: impl Fn(&DeliveryOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Runs the ingestion pipeline for each inbound signal.
pub struct Dispatcher {
    config: DispatcherConfig,
    preferences: Arc<PreferenceStore>,
    sender: Arc<dyn MessageSender>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        preferences: Arc<PreferenceStore>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            config,
            preferences,
            sender,
        }
    }

    /// Normalize a raw payload and dispatch it.
    pub async fn dispatch(&self, raw: &RawSignal) -> DispatchReport {
        match normalize(raw) {
            Ok(signal) => self.dispatch_signal(signal).await,
            Err(e) => {
                warn!(error = %e, "Dropping signal");
                DispatchReport::dropped(e)
            }
        }
    }

    /// Filter an already normalized signal and fan it out.
    pub async fn dispatch_signal(&self, signal: NormalizedSignal) -> DispatchReport {
        if let Err(rejection) = self.config.filter.check(&signal) {
            info!(
                token = %signal.token,
                strategy = %signal.strategy,
                reason = %rejection,
                "Signal filtered out"
            );
            let results = self
                .config
                .recipients
                .iter()
                .map(|&id| DispatchResult::new(id, DeliveryOutcome::FilteredBeforeDispatch))
                .collect();
            return DispatchReport {
                status: DispatchStatus::Filtered(rejection),
                signal: Some(signal),
                message: None,
                results,
            };
        }

        let category = signal.action.category();
        let message = format_signal(&signal);

        if self.config.recipients.is_empty() {
            warn!(token = %signal.token, "No recipients configured");
        }

        let results = join_all(
            self.config
                .recipients
                .iter()
                .map(|&id| self.deliver(id, category, &message)),
        )
        .await;

        let report = DispatchReport {
            status: DispatchStatus::Processed,
            signal: Some(signal),
            message: Some(message),
            results,
        };

        if let Some(signal) = &report.signal {
            info!(
                action = %signal.action,
                token = %signal.token,
                sent = report.sent_count(),
                blocked = report.blocked_count(),
                failed = report.failed_count(),
                "Signal dispatched"
            );
        }

        report
    }

    async fn deliver(
        &self,
        recipient: RecipientId,
        category: MessageCategory,
        message: &str,
    ) -> DispatchResult {
        // Snapshot only; no store lock is held across the send.
        if !self.preferences.should_deliver(recipient, category) {
            debug!(chat_id = recipient, %category, "Blocked by recipient preferences");
            return DispatchResult::new(recipient, DeliveryOutcome::BlockedByPreference);
        }

        match self.sender.send_message(recipient, message).await {
            Ok(()) => {
                debug!(chat_id = recipient, "Signal sent");
                DispatchResult::new(recipient, DeliveryOutcome::Sent)
            }
            Err(e) => {
                error!(chat_id = recipient, error = %e, "Failed to send signal");
                DispatchResult::new(recipient, DeliveryOutcome::DeliveryError(e.to_string()))
            }
        }
    }
}
