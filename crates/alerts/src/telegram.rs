//! Telegram bot: outbound delivery and the command/menu UI.

use crate::format::format_signal;
use crate::preferences::{PreferenceField, PreferenceStore, RecipientId, RecipientPreferences};
use crate::price::{format_usd, PriceChange, PriceClient};
use crate::sender::{MessageSender, SendError};
use async_trait::async_trait;
use relay_core::{NormalizedSignal, SignalAction};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, UserId};
use teloxide::utils::command::BotCommands;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and show your chat ID")]
    Start,
    #[command(description = "Show the main menu")]
    Menu,
    #[command(description = "Show your notification status")]
    Status,
    #[command(description = "Check the live BTC price")]
    Price,
    #[command(description = "Show help")]
    Help,
}

/// Inline keyboard actions, keyed by callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Notifications,
    Price,
    Status,
    Help,
    TestSignal,
    Toggle(PreferenceField),
    Back,
}

impl MenuAction {
    pub fn from_data(data: &str) -> Option<Self> {
        match data {
            "menu_notifications" => Some(MenuAction::Notifications),
            "menu_price" => Some(MenuAction::Price),
            "menu_status" => Some(MenuAction::Status),
            "menu_help" => Some(MenuAction::Help),
            "menu_test" => Some(MenuAction::TestSignal),
            "toggle_all_notifications" => Some(MenuAction::Toggle(PreferenceField::Notifications)),
            "toggle_price_alerts" => Some(MenuAction::Toggle(PreferenceField::PriceAlerts)),
            "toggle_signal_alerts" => Some(MenuAction::Toggle(PreferenceField::SignalAlerts)),
            "back_to_main" => Some(MenuAction::Back),
            _ => None,
        }
    }

    pub fn data(self) -> &'static str {
        match self {
            MenuAction::Notifications => "menu_notifications",
            MenuAction::Price => "menu_price",
            MenuAction::Status => "menu_status",
            MenuAction::Help => "menu_help",
            MenuAction::TestSignal => "menu_test",
            MenuAction::Toggle(PreferenceField::Notifications) => "toggle_all_notifications",
            MenuAction::Toggle(PreferenceField::PriceAlerts) => "toggle_price_alerts",
            MenuAction::Toggle(PreferenceField::SignalAlerts) => "toggle_signal_alerts",
            MenuAction::Back => "back_to_main",
        }
    }

    fn button(self, label: impl Into<String>) -> InlineKeyboardButton {
        InlineKeyboardButton::callback(label, self.data())
    }
}

/// Main menu keyboard.
pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            MenuAction::Notifications.button("🔔 Notifications"),
            MenuAction::Price.button("📊 Price Check"),
        ],
        vec![
            MenuAction::Status.button("📈 Status"),
            MenuAction::Help.button("ℹ️ Help"),
        ],
        vec![MenuAction::TestSignal.button("🧪 Test Signal")],
    ])
}

fn back_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![MenuAction::Back.button("⬅️ Back to Menu")]])
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "🟢"
    } else {
        "🔴"
    }
}

/// Notification toggles keyboard reflecting the current state.
pub fn notifications_menu(prefs: &RecipientPreferences) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = PreferenceField::ALL
        .iter()
        .map(|&field| {
            vec![MenuAction::Toggle(field)
                .button(format!("{} {}", on_off(prefs.get(field)), field.label()))]
        })
        .collect();
    rows.push(vec![MenuAction::Back.button("⬅️ Back to Menu")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn notifications_text(prefs: &RecipientPreferences) -> String {
    let mut text = String::from(
        "🔔 <b>Notification Settings</b>\n\n\
         Control what alerts you receive:\n\
         🟢 = Enabled  🔴 = Disabled\n",
    );
    for field in PreferenceField::ALL {
        let state = if prefs.get(field) { "ON" } else { "OFF" };
        text.push_str(&format!(
            "\n• {}: {} {}",
            field.label(),
            on_off(prefs.get(field)),
            state
        ));
    }
    text
}

pub fn status_text(prefs: &RecipientPreferences) -> String {
    let enabled = |on: bool| if on { "✅ Enabled" } else { "❌ Disabled" };
    format!(
        "📊 <b>Bot Status</b>\n\n\
         🤖 <b>System:</b> Online ✅\n\
         🔔 <b>Notifications:</b> {}\n\
         📈 <b>Price Alerts:</b> {}\n\
         🎯 <b>Signal Alerts:</b> {}\n\n\
         ⏰ <b>Last Update:</b> {}\n\n\
         💡 Use /menu to access controls",
        enabled(prefs.notifications_enabled),
        enabled(prefs.price_alerts_enabled),
        enabled(prefs.signal_alerts_enabled),
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// Price check message; includes the change when a previous price is known.
pub fn price_text(price: f64, previous: Option<f64>) -> String {
    let change = previous
        .and_then(|prev| PriceChange::between(prev, price))
        .map(|c| {
            let sign = if c.delta >= 0.0 { "+" } else { "" };
            format!(
                "\n{} Change: {}{} ({}{:.2}%)",
                c.arrow(),
                sign,
                format_usd(c.delta),
                sign,
                c.percent
            )
        })
        .unwrap_or_default();

    format!(
        "💰 <b>Live BTC Price</b>\n\n\
         <b>Current Price:</b> {}{}\n\n\
         📊 Exchange: Coinbase\n\
         🕐 Updated: {}",
        format_usd(price),
        change,
        chrono::Utc::now().format("%H:%M:%S UTC"),
    )
}

fn welcome_text(chat_id: RecipientId) -> String {
    format!(
        "🤖 <b>Welcome to the Trading Signal Bot!</b>\n\n\
         This bot forwards TradingView alerts to authorized chats.\n\n\
         🔔 Trading signal and price alerts\n\
         📊 Live BTC price\n\
         ⚙️ Per-chat notification toggles\n\n\
         <b>Your Chat ID:</b> <code>{}</code>\n\n\
         Choose an option from the menu below:",
        chat_id
    )
}

fn help_text() -> String {
    format!(
        "ℹ️ <b>Help</b>\n\n{}\n\n\
         <b>Connecting TradingView:</b>\n\
         Point an alert webhook at <code>/webhook</code> with a JSON body like:\n\
         <code>{{\"secret\":\"...\",\"action\":\"{{{{strategy.order.action}}}}\",\
         \"symbol\":\"{{{{ticker}}}}\",\"price\":\"{{{{close}}}}\",\"strategy\":\"Your Strategy\"}}</code>",
        Command::descriptions()
    )
}

/// Chat a menu button belongs to: the chat of the message carrying the
/// keyboard, or the pressing user's private chat when that message is gone.
fn callback_chat(message_chat: Option<ChatId>, from: UserId) -> ChatId {
    message_chat.unwrap_or_else(|| ChatId::from(from))
}

/// Sample signal used by the "Test Signal" button.
pub fn test_signal() -> NormalizedSignal {
    NormalizedSignal::new(SignalAction::parse("TEST"), "BTCUSD")
        .with_price("67,500")
        .with_strategy("Bot Test")
        .with_message("Your bot is working correctly!")
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    preferences: Arc<PreferenceStore>,
    prices: PriceClient,
    send_timeout: Duration,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(
        token: &str,
        preferences: Arc<PreferenceStore>,
        prices: PriceClient,
        send_timeout: Duration,
    ) -> Self {
        Self {
            bot: Bot::new(token),
            preferences,
            prices,
            send_timeout,
        }
    }

    /// Run the command and callback handlers until the dispatcher stops.
    pub async fn run(self: Arc<Self>) {
        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Failed to register bot commands");
        }

        let commands = Arc::clone(&self);
        let callbacks = Arc::clone(&self);
        let handler = dptree::entry()
            .branch(Update::filter_message().filter_command::<Command>().endpoint(
                move |bot: Bot, msg: Message, cmd: Command| {
                    let this = Arc::clone(&commands);
                    async move { this.handle_command(bot, msg, cmd).await }
                },
            ))
            .branch(Update::filter_callback_query().endpoint(
                move |bot: Bot, q: CallbackQuery| {
                    let this = Arc::clone(&callbacks);
                    async move { this.handle_callback(bot, q).await }
                },
            ));

        info!("Telegram bot polling started");
        Dispatcher::builder(self.bot.clone(), handler)
            .build()
            .dispatch()
            .await;
    }

    async fn handle_command(
        &self,
        bot: Bot,
        msg: Message,
        cmd: Command,
    ) -> Result<(), TelegramError> {
        let chat_id = msg.chat.id;

        match cmd {
            Command::Start => {
                // Registers the chat with default preferences.
                self.preferences.get(chat_id.0);
                bot.send_message(chat_id, welcome_text(chat_id.0))
                    .parse_mode(ParseMode::Html)
                    .reply_markup(main_menu())
                    .await?;
            }
            Command::Menu => self.send_main_menu(&bot, chat_id).await?,
            Command::Status => {
                bot.send_message(chat_id, status_text(&self.preferences.get(chat_id.0)))
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            Command::Price => self.send_price(&bot, chat_id).await?,
            Command::Help => {
                bot.send_message(chat_id, help_text())
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
        }

        Ok(())
    }

    async fn handle_callback(&self, bot: Bot, q: CallbackQuery) -> Result<(), TelegramError> {
        bot.answer_callback_query(q.id.clone()).await?;

        let chat_id = callback_chat(q.message.as_ref().map(|m| m.chat().id), q.from.id);
        let Some(action) = q.data.as_deref().and_then(MenuAction::from_data) else {
            warn!(chat_id = chat_id.0, data = ?q.data, "Unknown callback data");
            return Ok(());
        };

        match action {
            MenuAction::Notifications => {
                let prefs = self.preferences.get(chat_id.0);
                self.send_notifications(&bot, chat_id, &prefs).await?;
            }
            MenuAction::Toggle(field) => {
                let enabled = self.preferences.toggle(chat_id.0, field);
                info!(chat_id = chat_id.0, ?field, enabled, "Preference toggled");
                let prefs = self.preferences.get(chat_id.0);
                self.send_notifications(&bot, chat_id, &prefs).await?;
            }
            MenuAction::Price => self.send_price(&bot, chat_id).await?,
            MenuAction::Status => {
                bot.send_message(chat_id, status_text(&self.preferences.get(chat_id.0)))
                    .parse_mode(ParseMode::Html)
                    .reply_markup(back_menu())
                    .await?;
            }
            MenuAction::Help => {
                bot.send_message(chat_id, help_text())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(back_menu())
                    .await?;
            }
            MenuAction::TestSignal => {
                bot.send_message(chat_id, format_signal(&test_signal()))
                    .parse_mode(ParseMode::Html)
                    .reply_markup(back_menu())
                    .await?;
            }
            MenuAction::Back => self.send_main_menu(&bot, chat_id).await?,
        }

        Ok(())
    }

    async fn send_main_menu(&self, bot: &Bot, chat_id: ChatId) -> Result<(), TelegramError> {
        bot.send_message(chat_id, "🎛️ <b>Main Menu</b>\n\nChoose an option:")
            .parse_mode(ParseMode::Html)
            .reply_markup(main_menu())
            .await?;
        Ok(())
    }

    async fn send_notifications(
        &self,
        bot: &Bot,
        chat_id: ChatId,
        prefs: &RecipientPreferences,
    ) -> Result<(), TelegramError> {
        bot.send_message(chat_id, notifications_text(prefs))
            .parse_mode(ParseMode::Html)
            .reply_markup(notifications_menu(prefs))
            .await?;
        Ok(())
    }

    async fn send_price(&self, bot: &Bot, chat_id: ChatId) -> Result<(), TelegramError> {
        let text = match self.prices.btc_usd().await {
            Ok(price) => {
                let previous = self.preferences.record_btc_price(chat_id.0, price);
                price_text(price, previous)
            }
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "Failed to fetch BTC price");
                "❌ Unable to fetch BTC price. Please try again.".to_string()
            }
        };

        let keyboard = InlineKeyboardMarkup::new(vec![
            vec![MenuAction::Price.button("🔄 Refresh")],
            vec![MenuAction::Back.button("⬅️ Back to Menu")],
        ]);
        bot.send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageSender for TelegramBot {
    async fn send_message(&self, recipient: RecipientId, text: &str) -> Result<(), SendError> {
        let request = self
            .bot
            .send_message(ChatId(recipient), text)
            .parse_mode(ParseMode::Html)
            .send();

        match tokio::time::timeout(self.send_timeout, request).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(SendError::Api(e.to_string())),
            Err(_) => Err(SendError::Timeout(self.send_timeout)),
        }
    }
}
