//! Signal delivery to Telegram recipients.
//!
//! This crate provides:
//! - In-memory per-recipient notification preferences
//! - Signal message formatting
//! - The dispatcher that fans signals out to recipients
//! - Telegram bot integration (delivery and menu UI)

pub mod dispatcher;
pub mod format;
pub mod preferences;
pub mod price;
pub mod sender;
pub mod telegram;

pub use dispatcher::{
    DeliveryOutcome, DispatchReport, DispatchResult, DispatchStatus, Dispatcher, DispatcherConfig,
};
pub use format::format_signal;
pub use preferences::{
    PreferenceField, PreferenceStore, PreferencesPatch, RecipientId, RecipientPreferences,
};
pub use price::{PriceClient, PriceError};
pub use sender::{MessageSender, MockSender, SendError};
pub use telegram::{TelegramBot, TelegramError};
