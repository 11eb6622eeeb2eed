//! Signal Relay - Headless Server
//!
//! Receives TradingView webhook alerts and relays them to Telegram chats.

mod config;
mod http_server;
mod state;

use async_trait::async_trait;
use clap::Parser;
use config::AppConfig;
use relay_alerts::{
    MessageSender, PreferenceStore, PriceClient, RecipientId, SendError, TelegramBot,
};
use state::create_state;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Signal Relay CLI
#[derive(Parser, Debug)]
#[command(name = "signal-relay")]
#[command(about = "TradingView webhook to Telegram signal relay", long_about = None)]
struct Args {
    /// HTTP port for the webhook server (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run without Telegram: no bot polling, deliveries are only logged
    #[arg(long, default_value_t = false)]
    no_bot: bool,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Sender used with `--no-bot`: logs each delivery instead of sending it.
struct LogOnlySender;

#[async_trait]
impl MessageSender for LogOnlySender {
    async fn send_message(&self, recipient: RecipientId, text: &str) -> Result<(), SendError> {
        info!(chat_id = recipient, chars = text.chars().count(), "Delivery skipped (no bot)");
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    if let Some(port) = args.port {
        config.port = port;
    }

    info!("🚀 Signal Relay starting...");
    info!("  Port: {}", config.port);
    info!("  Recipients: {}", config.allowed_chat_ids.len());
    info!("  Allowed tokens: {}", describe_list(config.allowed_tokens.entries()));
    info!("  Allowed strategies: {}", describe_list(config.allowed_strategies.entries()));
    info!("  Price updates: {}", config.allow_price_updates);
    info!("  Webhook secret: {}", if config.secret_configured() { "configured" } else { "not set" });

    if config.allowed_chat_ids.is_empty() {
        warn!("ALLOWED_CHAT_IDS is empty, signals will not be delivered");
    }

    let preferences = Arc::new(PreferenceStore::new());

    let (sender, bot): (Arc<dyn MessageSender>, Option<Arc<TelegramBot>>) = if args.no_bot {
        info!("  Telegram: disabled (--no-bot)");
        (Arc::new(LogOnlySender), None)
    } else {
        let Some(token) = config.bot_token.as_deref() else {
            error!("BOT_TOKEN is not set (use --no-bot to run without Telegram)");
            return;
        };
        let prices = match PriceClient::new(config.send_timeout()) {
            Ok(prices) => prices,
            Err(e) => {
                error!("Failed to create price client: {}", e);
                return;
            }
        };
        let bot = Arc::new(TelegramBot::new(
            token,
            Arc::clone(&preferences),
            prices,
            config.send_timeout(),
        ));
        let sender: Arc<dyn MessageSender> = bot.clone();
        (sender, Some(bot))
    };

    let port = config.port;
    let state = create_state(config, preferences, sender);

    let server_handle = match http_server::start_http_server(state.clone(), port).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start HTTP server: {}", e);
            return;
        }
    };

    let bot_handle = bot.map(|bot| tokio::spawn(bot.run()));

    // Handle shutdown
    info!("Press Ctrl+C to stop...");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");

    warn!("Shutdown signal received");

    if let Some(handle) = bot_handle {
        handle.abort();
    }
    server_handle.abort();
    let _ = tokio::time::timeout(Duration::from_secs(1), server_handle).await;

    // Final stats
    let summary = state.stats_summary();
    info!("📈 Final Stats:");
    info!("  Total uptime: {} seconds", summary.uptime_secs);
    info!("  Signals received: {}", summary.signals_received);
    info!("  Processed: {}", summary.signals_processed);
    info!("  Filtered: {}", summary.signals_filtered);
    info!("  Dropped: {}", summary.signals_dropped);
    info!("  Messages delivered: {}", summary.messages_delivered);

    info!("👋 Signal Relay stopped");
}

fn describe_list(entries: &[String]) -> String {
    if entries.is_empty() {
        "all".to_string()
    } else {
        entries.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["signal-relay"]);
        assert_eq!(args.port, None);
        assert_eq!(args.log_level, "info");
        assert!(!args.no_bot);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from(["signal-relay", "-p", "5000", "--no-bot", "-l", "debug"]);
        assert_eq!(args.port, Some(5000));
        assert_eq!(args.log_level, "debug");
        assert!(args.no_bot);
    }

    #[test]
    fn test_describe_list() {
        assert_eq!(describe_list(&[]), "all");
        assert_eq!(
            describe_list(&["BTCUSD".to_string(), "ETHUSD".to_string()]),
            "BTCUSD, ETHUSD"
        );
    }

    #[tokio::test]
    async fn test_log_only_sender_always_succeeds() {
        let sender = LogOnlySender;
        assert!(sender.send_message(42, "hello").await.is_ok());
    }
}
