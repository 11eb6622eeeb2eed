//! Raw webhook payloads and the canonical signal record.

use crate::{NormalizeError, SignalAction};
use chrono::{DateTime, SecondsFormat, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Untyped webhook payload as received from the alert source.
pub type RawSignal = Map<String, Value>;

/// Candidate keys per canonical field, in precedence order.
pub const ACTION_KEYS: &[&str] = &["action", "side", "signal"];
pub const TOKEN_KEYS: &[&str] = &["token", "symbol", "ticker"];
pub const STRATEGY_KEYS: &[&str] = &["strategy", "indicator", "source"];
pub const PRICE_KEYS: &[&str] = &["price", "close", "current_price"];
pub const EXCHANGE_KEYS: &[&str] = &["exchange", "market"];
pub const MESSAGE_KEYS: &[&str] = &["message", "comment", "alert_message"];
pub const TIMESTAMP_KEYS: &[&str] = &["timestamp"];

/// Strategy label used when the payload names none.
pub const DEFAULT_STRATEGY: &str = "Manual Alert";

/// Canonical trading signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSignal {
    /// Upper-cased action.
    pub action: SignalAction,
    /// Instrument symbol without exchange prefix (e.g., "BTCUSDT")
    pub token: CompactString,
    /// Strategy label, [`DEFAULT_STRATEGY`] when absent
    pub strategy: String,
    /// Price as sent by the source (not parsed)
    pub price: Option<String>,
    /// Exchange name
    pub exchange: Option<String>,
    /// Free-text detail or comment
    pub message: Option<String>,
    /// ISO-8601 timestamp
    pub timestamp: String,
}

impl NormalizedSignal {
    /// Create a signal with only the mandatory fields, stamped now.
    pub fn new(action: SignalAction, token: &str) -> Self {
        Self {
            action,
            token: clean_token(token),
            strategy: DEFAULT_STRATEGY.to_string(),
            price: None,
            exchange: None,
            message: None,
            timestamp: now_iso8601(Utc::now()),
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}

/// Normalize a raw payload, stamping missing timestamps with the current time.
pub fn normalize(raw: &RawSignal) -> Result<NormalizedSignal, NormalizeError> {
    normalize_at(raw, Utc::now())
}

/// Normalize a raw payload using `now` for a missing timestamp.
pub fn normalize_at(
    raw: &RawSignal,
    now: DateTime<Utc>,
) -> Result<NormalizedSignal, NormalizeError> {
    let action = extract_field(raw, ACTION_KEYS)
        .filter(|a| !a.is_empty())
        .ok_or(NormalizeError::MissingAction)?;

    let token = extract_field(raw, TOKEN_KEYS)
        .map(|t| clean_token(&t))
        .filter(|t| !t.is_empty())
        .ok_or(NormalizeError::MissingToken)?;

    Ok(NormalizedSignal {
        action: SignalAction::parse(&action),
        token,
        strategy: non_empty(extract_field(raw, STRATEGY_KEYS))
            .unwrap_or_else(|| DEFAULT_STRATEGY.to_string()),
        price: non_empty(extract_field(raw, PRICE_KEYS)),
        exchange: non_empty(extract_field(raw, EXCHANGE_KEYS)),
        message: non_empty(extract_field(raw, MESSAGE_KEYS)),
        timestamp: non_empty(extract_field(raw, TIMESTAMP_KEYS))
            .unwrap_or_else(|| now_iso8601(now)),
    })
}

/// Return the first candidate key that is present with a non-null value.
///
/// Later candidates are never consulted once one matches, even if its value
/// turns out to be empty.
pub fn extract_field(raw: &RawSignal, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| raw.get(*key).filter(|v| !v.is_null()))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

/// Strip an exchange prefix, keeping only the segment after the last colon.
pub fn clean_token(token: &str) -> CompactString {
    let symbol = token.rsplit(':').next().unwrap_or(token);
    CompactString::new(symbol.trim())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn now_iso8601(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}
