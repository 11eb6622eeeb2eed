//! Per-recipient notification preferences.
//!
//! Volatile, process-lifetime state shared by the bot UI (writes) and the
//! dispatcher (reads). Every mutation happens under the map's entry lock, so
//! a toggle is a single atomic read-modify-write.

use dashmap::DashMap;
use relay_core::MessageCategory;
use serde::{Deserialize, Serialize};

/// Recipient identity (Telegram chat ID).
pub type RecipientId = i64;

/// Notification toggles for one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecipientPreferences {
    /// Master switch
    pub notifications_enabled: bool,
    /// Price update alerts
    pub price_alerts_enabled: bool,
    /// Trading signal alerts
    pub signal_alerts_enabled: bool,
    /// Last BTC price shown to this recipient by the price check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_btc_price: Option<f64>,
}

impl Default for RecipientPreferences {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            price_alerts_enabled: true,
            signal_alerts_enabled: true,
            last_btc_price: None,
        }
    }
}

impl RecipientPreferences {
    pub fn get(&self, field: PreferenceField) -> bool {
        match field {
            PreferenceField::Notifications => self.notifications_enabled,
            PreferenceField::PriceAlerts => self.price_alerts_enabled,
            PreferenceField::SignalAlerts => self.signal_alerts_enabled,
        }
    }

    pub fn set(&mut self, field: PreferenceField, value: bool) {
        match field {
            PreferenceField::Notifications => self.notifications_enabled = value,
            PreferenceField::PriceAlerts => self.price_alerts_enabled = value,
            PreferenceField::SignalAlerts => self.signal_alerts_enabled = value,
        }
    }

    /// Check if a message of the given category should be delivered.
    pub fn allows(&self, category: MessageCategory) -> bool {
        if !self.notifications_enabled {
            return false;
        }
        match category {
            MessageCategory::Price => self.price_alerts_enabled,
            MessageCategory::Signal => self.signal_alerts_enabled,
        }
    }
}

/// One of the three notification toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceField {
    Notifications,
    PriceAlerts,
    SignalAlerts,
}

impl PreferenceField {
    pub const ALL: [PreferenceField; 3] = [
        PreferenceField::Notifications,
        PreferenceField::PriceAlerts,
        PreferenceField::SignalAlerts,
    ];

    /// Human-readable label for menus.
    pub fn label(self) -> &'static str {
        match self {
            PreferenceField::Notifications => "All Notifications",
            PreferenceField::PriceAlerts => "Price Alerts",
            PreferenceField::SignalAlerts => "Trading Signals",
        }
    }
}

/// Partial update of the toggles. `None` leaves a field unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesPatch {
    #[serde(default)]
    pub notifications_enabled: Option<bool>,
    #[serde(default)]
    pub price_alerts_enabled: Option<bool>,
    #[serde(default)]
    pub signal_alerts_enabled: Option<bool>,
}

impl PreferencesPatch {
    fn apply(&self, prefs: &mut RecipientPreferences) {
        if let Some(v) = self.notifications_enabled {
            prefs.notifications_enabled = v;
        }
        if let Some(v) = self.price_alerts_enabled {
            prefs.price_alerts_enabled = v;
        }
        if let Some(v) = self.signal_alerts_enabled {
            prefs.signal_alerts_enabled = v;
        }
    }
}

/// Concurrent store of recipient preferences.
#[derive(Debug, Default)]
pub struct PreferenceStore {
    inner: DashMap<RecipientId, RecipientPreferences>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a recipient's preferences, creating defaults on first access.
    pub fn get(&self, id: RecipientId) -> RecipientPreferences {
        *self.inner.entry(id).or_default()
    }

    /// Set a toggle to an explicit value.
    pub fn set(&self, id: RecipientId, field: PreferenceField, value: bool) {
        self.inner.entry(id).or_default().set(field, value);
    }

    /// Flip a toggle and return its new value.
    pub fn toggle(&self, id: RecipientId, field: PreferenceField) -> bool {
        let mut prefs = self.inner.entry(id).or_default();
        let value = !prefs.get(field);
        prefs.set(field, value);
        value
    }

    /// Apply a partial update and return the resulting preferences.
    pub fn update(&self, id: RecipientId, patch: PreferencesPatch) -> RecipientPreferences {
        let mut prefs = self.inner.entry(id).or_default();
        patch.apply(&mut prefs);
        *prefs
    }

    /// Check whether a recipient wants messages of this category.
    pub fn should_deliver(&self, id: RecipientId, category: MessageCategory) -> bool {
        self.get(id).allows(category)
    }

    /// Store the latest BTC price shown to a recipient, returning the previous one.
    pub fn record_btc_price(&self, id: RecipientId, price: f64) -> Option<f64> {
        self.inner.entry(id).or_default().last_btc_price.replace(price)
    }

    /// Number of recipients seen so far.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
