//! Display formatting for signals.

use relay_core::{NormalizedSignal, SignalAction};
use teloxide::utils::html::escape;

/// Leading glyph and header label for an action bucket.
pub fn action_header(action: &SignalAction) -> (&'static str, &'static str) {
    match action {
        SignalAction::Buy | SignalAction::Long => ("🟢📈", "TRADING SIGNAL"),
        SignalAction::Sell | SignalAction::Short => ("🔴📉", "TRADING SIGNAL"),
        SignalAction::PriceUpdate | SignalAction::PriceMovement => ("💰📊", "PRICE UPDATE"),
        SignalAction::Other(_) => ("🔔", "TRADING SIGNAL"),
    }
}

/// Format a signal as an HTML alert message.
///
/// Exchange and details lines are only emitted when those fields are present.
pub fn format_signal(signal: &NormalizedSignal) -> String {
    let (glyph, label) = action_header(&signal.action);

    let price = match signal.price.as_deref() {
        Some(p) if p.starts_with('$') => escape(p),
        Some(p) => format!("${}", escape(p)),
        None => "N/A".to_string(),
    };

    let mut msg = format!(
        "{} <b>{}</b>\n\n\
         📊 <b>Symbol:</b> {}\n\
         🎯 <b>Action:</b> {}\n\
         💰 <b>Price:</b> {}\n\
         📈 <b>Strategy:</b> {}",
        glyph,
        label,
        escape(&signal.token),
        escape(signal.action.as_str()),
        price,
        escape(&signal.strategy),
    );

    if let Some(exchange) = signal.exchange.as_deref().filter(|e| !e.is_empty()) {
        msg.push_str(&format!("\n🏢 <b>Exchange:</b> {}", escape(exchange)));
    }

    if let Some(details) = signal.message.as_deref().filter(|m| !m.is_empty()) {
        msg.push_str(&format!("\n📝 <b>Details:</b> {}", escape(details)));
    }

    msg.push_str(&format!("\n\n⏰ <b>Time:</b> {}", escape(&signal.timestamp)));
    msg.push_str("\n\n💡 <i>Use /menu to control notifications</i>");

    msg
}
