//! Application configuration.

use relay_alerts::{DispatcherConfig, RecipientId};
use relay_core::{AllowList, SignalFilter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Placeholder secret that counts as "not configured".
const DEFAULT_SECRET: &str = "default_secret";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid chat ID in ALLOWED_CHAT_IDS: {0}")]
    InvalidChatId(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Telegram bot token.
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,
    /// Shared secret expected in webhook payloads (None = no check).
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
    /// Chats that receive signals, in delivery order.
    pub allowed_chat_ids: Vec<RecipientId>,
    /// Tokens to accept (empty = all).
    pub allowed_tokens: AllowList,
    /// Strategies to accept (empty = all).
    pub allowed_strategies: AllowList,
    /// Let PRICE_UPDATE / PRICE_MOVEMENT signals through the action check.
    pub allow_price_updates: bool,
    /// Timeout for a single Telegram delivery or price lookup.
    pub send_timeout_secs: u64,
    /// HTTP port for the webhook server.
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            webhook_secret: None,
            allowed_chat_ids: Vec::new(),
            allowed_tokens: AllowList::default(),
            allowed_strategies: AllowList::default(),
            allow_price_updates: false,
            send_timeout_secs: 10,
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let allowed_chat_ids = match get("ALLOWED_CHAT_IDS") {
            Some(value) => parse_chat_ids(&value)?,
            None => Vec::new(),
        };

        let allow_price_updates = match get("ALLOW_PRICE_UPDATES") {
            Some(value) => parse_bool("ALLOW_PRICE_UPDATES", &value)?,
            None => defaults.allow_price_updates,
        };

        let send_timeout_secs = match get("SEND_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|&secs| secs > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: "SEND_TIMEOUT_SECS",
                    value,
                })?,
            None => defaults.send_timeout_secs,
        };

        let port = match get("PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: value.clone(),
            })?,
            None => defaults.port,
        };

        Ok(Self {
            bot_token: get("BOT_TOKEN"),
            webhook_secret: get("WEBHOOK_SECRET").filter(|s| s != DEFAULT_SECRET),
            allowed_chat_ids,
            allowed_tokens: get("ALLOWED_TOKENS")
                .map(|v| AllowList::parse_csv(&v))
                .unwrap_or_default(),
            allowed_strategies: get("ALLOWED_STRATEGIES")
                .map(|v| AllowList::parse_csv(&v))
                .unwrap_or_default(),
            allow_price_updates,
            send_timeout_secs,
            port,
        })
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn secret_configured(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// Check a received secret. Always passes when no secret is configured.
    pub fn secret_matches(&self, received: Option<&str>) -> bool {
        match &self.webhook_secret {
            Some(expected) => received == Some(expected.as_str()),
            None => true,
        }
    }

    pub fn signal_filter(&self) -> SignalFilter {
        SignalFilter::new(self.allowed_tokens.clone(), self.allowed_strategies.clone())
            .with_price_updates(self.allow_price_updates)
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            recipients: self.allowed_chat_ids.clone(),
            filter: self.signal_filter(),
        }
    }
}

fn parse_chat_ids(value: &str) -> Result<Vec<RecipientId>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<RecipientId>()
                .map_err(|_| ConfigError::InvalidChatId(id.to_string()))
        })
        .collect()
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.send_timeout_secs, 10);
        assert!(!config.secret_configured());
        assert!(config.allowed_chat_ids.is_empty());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bot_token, None);
        assert!(config.allowed_tokens.is_empty());
        assert!(config.allowed_strategies.is_empty());
        assert!(!config.allow_price_updates);
    }

    #[test]
    fn test_full_environment() {
        let config = config_from(&[
            ("BOT_TOKEN", "123:abc"),
            ("WEBHOOK_SECRET", "s3cret"),
            ("ALLOWED_CHAT_IDS", "111, -100222 ,"),
            ("ALLOWED_TOKENS", "BTCUSD,ETHUSD"),
            ("ALLOWED_STRATEGIES", "EMA_Cross"),
            ("ALLOW_PRICE_UPDATES", "true"),
            ("SEND_TIMEOUT_SECS", "5"),
            ("PORT", "5000"),
        ])
        .unwrap();

        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.allowed_chat_ids, vec![111, -100222]);
        assert_eq!(config.allowed_tokens.len(), 2);
        assert!(config.allowed_strategies.contains("ema_cross"));
        assert!(config.allow_price_updates);
        assert_eq!(config.send_timeout(), Duration::from_secs(5));
        assert_eq!(config.port, 5000);

        let dispatch = config.dispatcher_config();
        assert_eq!(dispatch.recipients, vec![111, -100222]);
        assert!(dispatch.filter.allow_price_updates);
    }

    #[test]
    fn test_invalid_chat_id() {
        assert_eq!(
            config_from(&[("ALLOWED_CHAT_IDS", "123,abc")]).unwrap_err(),
            ConfigError::InvalidChatId("abc".to_string())
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&[("PORT", "99999")]).is_err());
        assert!(config_from(&[("SEND_TIMEOUT_SECS", "0")]).is_err());
        assert!(config_from(&[("ALLOW_PRICE_UPDATES", "maybe")]).is_err());
    }

    #[test]
    fn test_secret_handling() {
        let placeholder = config_from(&[("WEBHOOK_SECRET", "default_secret")]).unwrap();
        assert!(!placeholder.secret_configured());
        assert!(placeholder.secret_matches(None));

        let config = config_from(&[("WEBHOOK_SECRET", "s3cret")]).unwrap();
        assert!(config.secret_matches(Some("s3cret")));
        assert!(!config.secret_matches(Some("wrong")));
        assert!(!config.secret_matches(None));
    }

    #[test]
    fn test_config_serialization_hides_secrets() {
        let config = config_from(&[("BOT_TOKEN", "123:abc"), ("WEBHOOK_SECRET", "s3cret")]).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("123:abc"));
        assert!(!json.contains("s3cret"));
    }
}
