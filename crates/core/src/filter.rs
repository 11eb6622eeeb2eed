//! Allow-list filtering for normalized signals.

use crate::{FilterRejection, NormalizedSignal};
use serde::{Deserialize, Serialize};

/// Set of permitted values. Empty means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList(Vec<String>);

impl AllowList {
    /// Build from entries, trimming them and dropping blanks.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            entries
                .into_iter()
                .map(|e| e.as_ref().trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }

    /// Parse a comma-separated list (e.g., "BTCUSD, ETHUSD").
    pub fn parse_csv(value: &str) -> Self {
        Self::new(value.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// Exact case-insensitive membership, compared upper-cased.
    pub fn contains(&self, value: &str) -> bool {
        let value = value.to_uppercase();
        self.0.iter().any(|e| e.to_uppercase() == value)
    }

    /// Returns true if the list is empty (all allowed) or contains the value.
    pub fn allows(&self, value: &str) -> bool {
        self.is_empty() || self.contains(value)
    }
}

/// Filter engine configuration and decision logic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalFilter {
    /// Tokens to accept (empty = all)
    pub allowed_tokens: AllowList,
    /// Strategies to accept (empty = all)
    pub allowed_strategies: AllowList,
    /// Let PRICE_UPDATE / PRICE_MOVEMENT through the action check.
    pub allow_price_updates: bool,
}

impl SignalFilter {
    pub fn new(allowed_tokens: AllowList, allowed_strategies: AllowList) -> Self {
        Self {
            allowed_tokens,
            allowed_strategies,
            allow_price_updates: false,
        }
    }

    pub fn with_price_updates(mut self, allow: bool) -> Self {
        self.allow_price_updates = allow;
        self
    }

    /// Run the token, strategy and action checks in order, stopping at the
    /// first rejection.
    pub fn check(&self, signal: &NormalizedSignal) -> Result<(), FilterRejection> {
        if !self.allowed_tokens.allows(&signal.token) {
            return Err(FilterRejection::TokenNotAllowed(signal.token.to_string()));
        }

        if !self.allowed_strategies.allows(&signal.strategy) {
            return Err(FilterRejection::StrategyNotAllowed(signal.strategy.clone()));
        }

        let action_ok =
            signal.action.is_trade() || (self.allow_price_updates && signal.action.is_price());
        if !action_ok {
            return Err(FilterRejection::InvalidAction(
                signal.action.as_str().to_string(),
            ));
        }

        Ok(())
    }

    pub fn should_process(&self, signal: &NormalizedSignal) -> bool {
        self.check(signal).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SignalAction;

    fn signal(action: &str, token: &str, strategy: &str) -> NormalizedSignal {
        NormalizedSignal::new(SignalAction::parse(action), token).with_strategy(strategy)
    }

    #[test]
    fn test_allow_list_matches_non_ascii_case_insensitively() {
        let list = AllowList::new(["ÉTHUSD"]);
        assert!(list.allows("éthusd"));
        assert!(list.allows("ÉthUSD"));
        assert!(!list.allows("ETHUSD"));
    }

    #[test]
    fn test_allow_list_drops_blank_entries() {
        let list = AllowList::parse_csv("BTCUSD, ,ETHUSD,");
        assert_eq!(list.entries(), &["BTCUSD".to_string(), "ETHUSD".to_string()]);

        assert!(AllowList::parse_csv("").is_empty());
        assert!(AllowList::parse_csv(" , ").is_empty());
    }

    #[test]
    fn test_empty_lists_accept_everything() {
        let filter = SignalFilter::default();
        assert!(filter.should_process(&signal("BUY", "ANYTHING", "Whatever")));
        assert!(filter.should_process(&signal("short", "ADAUSD", "Manual Alert")));
    }

    #[test]
    fn test_token_allow_list() {
        let filter = SignalFilter::new(
            AllowList::new(["BTCUSD", "ETHUSD"]),
            AllowList::default(),
        );

        assert!(filter.should_process(&signal("BUY", "BTCUSD", "EMA")));
        assert!(filter.should_process(&signal("BUY", "ethusd", "EMA")));
        assert_eq!(
            filter.check(&signal("BUY", "ADAUSD", "EMA")),
            Err(FilterRejection::TokenNotAllowed("ADAUSD".to_string()))
        );
    }

    #[test]
    fn test_strategy_allow_list() {
        let filter = SignalFilter::new(
            AllowList::default(),
            AllowList::new(["EMA_Cross", "RSI_Divergence"]),
        );

        assert!(filter.should_process(&signal("BUY", "BTCUSD", "EMA_Cross")));
        assert!(filter.should_process(&signal("BUY", "BTCUSD", "rsi_divergence")));
        assert_eq!(
            filter.check(&signal("BUY", "BTCUSD", "MACD")),
            Err(FilterRejection::StrategyNotAllowed("MACD".to_string()))
        );
    }

    #[test]
    fn test_token_check_runs_first() {
        let filter = SignalFilter::new(AllowList::new(["BTCUSD"]), AllowList::new(["EMA"]));
        assert_eq!(
            filter.check(&signal("INVALID", "ADAUSD", "MACD")),
            Err(FilterRejection::TokenNotAllowed("ADAUSD".to_string()))
        );
    }

    #[test]
    fn test_action_validity() {
        let filter = SignalFilter::default();

        for action in ["buy", "SELL", "Long", "short"] {
            assert!(filter.should_process(&signal(action, "BTCUSD", "EMA")), "{action}");
        }
        assert_eq!(
            filter.check(&signal("invalid", "BTCUSD", "EMA")),
            Err(FilterRejection::InvalidAction("INVALID".to_string()))
        );
        assert_eq!(
            filter.check(&signal(" buy ", "BTCUSD", "EMA")),
            Err(FilterRejection::InvalidAction(" BUY ".to_string()))
        );
    }

    #[test]
    fn test_price_updates_need_flag() {
        let update = signal("PRICE_UPDATE", "BTCUSD", "BTC 5min Price Feed");
        let movement = signal("price_movement", "BTCUSD", "BTC 5min Price Feed");

        let strict = SignalFilter::default();
        assert!(!strict.should_process(&update));
        assert!(!strict.should_process(&movement));

        let relaxed = SignalFilter::default().with_price_updates(true);
        assert!(relaxed.should_process(&update));
        assert!(relaxed.should_process(&movement));
        assert!(!relaxed.should_process(&signal("TEST", "BTCUSD", "Bot Test")));
    }
}
