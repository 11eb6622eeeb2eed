//! Signal action vocabulary and message categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action carried by a trading signal.
///
/// The raw value is always upper-cased. Anything outside the known vocabulary
/// is kept verbatim in [`SignalAction::Other`] so the filter can decide on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SignalAction {
    Buy,
    Sell,
    Long,
    Short,
    PriceUpdate,
    PriceMovement,
    Other(String),
}

impl SignalAction {
    /// Parse an action, upper-casing it first.
    pub fn parse(raw: &str) -> Self {
        let upper = raw.to_uppercase();
        match upper.as_str() {
            "BUY" => SignalAction::Buy,
            "SELL" => SignalAction::Sell,
            "LONG" => SignalAction::Long,
            "SHORT" => SignalAction::Short,
            "PRICE_UPDATE" => SignalAction::PriceUpdate,
            "PRICE_MOVEMENT" => SignalAction::PriceMovement,
            _ => SignalAction::Other(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Long => "LONG",
            SignalAction::Short => "SHORT",
            SignalAction::PriceUpdate => "PRICE_UPDATE",
            SignalAction::PriceMovement => "PRICE_MOVEMENT",
            SignalAction::Other(raw) => raw,
        }
    }

    /// Check if this is one of the tradable actions (BUY, SELL, LONG, SHORT).
    #[inline]
    pub fn is_trade(&self) -> bool {
        matches!(
            self,
            SignalAction::Buy | SignalAction::Sell | SignalAction::Long | SignalAction::Short
        )
    }

    /// Check if this is a price feed action (PRICE_UPDATE, PRICE_MOVEMENT).
    #[inline]
    pub fn is_price(&self) -> bool {
        matches!(self, SignalAction::PriceUpdate | SignalAction::PriceMovement)
    }

    /// Message category used for recipient preference routing.
    pub fn category(&self) -> MessageCategory {
        if self.is_price() {
            MessageCategory::Price
        } else {
            MessageCategory::Signal
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for SignalAction {
    fn from(raw: String) -> Self {
        SignalAction::parse(&raw)
    }
}

impl From<SignalAction> for String {
    fn from(action: SignalAction) -> Self {
        action.as_str().to_string()
    }
}

/// Coarse classification of a signal for preference routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    /// Price feed updates.
    Price,
    /// Trading signals (everything that is not a price update).
    Signal,
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageCategory::Price => f.write_str("price"),
            MessageCategory::Signal => f.write_str("signal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_surrounding_whitespace() {
        assert_eq!(
            SignalAction::parse(" buy "),
            SignalAction::Other(" BUY ".to_string())
        );
        assert!(!SignalAction::parse(" buy ").is_trade());
        assert_eq!(SignalAction::parse("   ").as_str(), "   ");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(SignalAction::parse("buy"), SignalAction::Buy);
        assert_eq!(SignalAction::parse("Sell"), SignalAction::Sell);
        assert_eq!(SignalAction::parse("long"), SignalAction::Long);
        assert_eq!(SignalAction::parse("SHORT"), SignalAction::Short);
        assert_eq!(SignalAction::parse("price_update"), SignalAction::PriceUpdate);
        assert_eq!(
            SignalAction::parse("Price_Movement"),
            SignalAction::PriceMovement
        );
    }

    #[test]
    fn test_unknown_action_is_upper_cased() {
        let action = SignalAction::parse("close_all");
        assert_eq!(action, SignalAction::Other("CLOSE_ALL".to_string()));
        assert_eq!(action.as_str(), "CLOSE_ALL");
        assert!(!action.is_trade());
    }

    #[test]
    fn test_category() {
        assert_eq!(SignalAction::PriceUpdate.category(), MessageCategory::Price);
        assert_eq!(SignalAction::PriceMovement.category(), MessageCategory::Price);
        assert_eq!(SignalAction::Buy.category(), MessageCategory::Signal);
        assert_eq!(
            SignalAction::parse("invalid").category(),
            MessageCategory::Signal
        );
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&SignalAction::Long).unwrap();
        assert_eq!(json, "\"LONG\"");

        let parsed: SignalAction = serde_json::from_str("\"short\"").unwrap();
        assert_eq!(parsed, SignalAction::Short);
    }
}
