//! Outbound message delivery seam.

use crate::preferences::RecipientId;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Errors from a single delivery attempt.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    #[error("Messaging API error: {0}")]
    Api(String),

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Something that can deliver a formatted message to one recipient.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `text` to `recipient`. Must not retry.
    async fn send_message(&self, recipient: RecipientId, text: &str) -> Result<(), SendError>;
}

/// In-memory sender for tests and dry runs.
///
/// Records every delivered message and fails for recipients in `failing`.
#[derive(Debug, Default)]
pub struct MockSender {
    failing: HashSet<RecipientId>,
    sent: Mutex<Vec<(RecipientId, String)>>,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `recipient` fail.
    pub fn failing_for(mut self, recipient: RecipientId) -> Self {
        self.failing.insert(recipient);
        self
    }

    /// Messages delivered so far, in completion order.
    pub fn sent(&self) -> Vec<(RecipientId, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Recipients that received at least one message, sorted.
    pub fn recipients(&self) -> Vec<RecipientId> {
        let mut ids: Vec<_> = self.sent().into_iter().map(|(id, _)| id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[async_trait]
impl MessageSender for MockSender {
    async fn send_message(&self, recipient: RecipientId, text: &str) -> Result<(), SendError> {
        if self.failing.contains(&recipient) {
            return Err(SendError::Api(format!("Mock failure for chat {}", recipient)));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((recipient, text.to_string()));
        }
        Ok(())
    }
}
