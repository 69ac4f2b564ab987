//! Telegram delivery channel.
//!
//! One notifier handles both paths: broadcasts to the configured alert
//! channel and direct messages to individual subscribers. Messages are
//! HTML-formatted; rendering happens here.

use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

use super::types::{signature_url, truncate_address, Notification, NotificationType};
use crate::events::Direction;
use crate::logger::{self, LogTag};

/// Telegram notifier for sending messages.
pub struct TelegramNotifier {
    bot: Bot,
    channel_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, channel_id: i64) -> Result<Self, String> {
        if bot_token.is_empty() {
            return Err("Bot token is empty".to_string());
        }
        if channel_id == 0 {
            return Err("Channel ID is not set".to_string());
        }
        Ok(Self {
            bot: Bot::new(bot_token),
            channel_id: ChatId(channel_id),
        })
    }

    /// Broadcast a notification to the alert channel.
    pub async fn send(&self, notification: &Notification) -> Result<(), String> {
        let message = format_notification(notification);
        self.send_message(&message).await
    }

    /// Send a plain HTML message to the alert channel.
    pub async fn send_message(&self, message: &str) -> Result<(), String> {
        self.bot
            .send_message(self.channel_id, message)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| format!("Failed to send Telegram message: {}", e))?;

        logger::debug(
            LogTag::Telegram,
            &format!("Sent channel message (length={})", message.len()),
        );
        Ok(())
    }

    /// Direct-message one user, used for periodic summaries.
    pub async fn send_direct(&self, user_id: i64, message: &str) -> Result<(), String> {
        self.bot
            .send_message(ChatId(user_id), message)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| format!("Failed to DM user {}: {}", user_id, e))?;
        Ok(())
    }
}

/// Render a notification as Telegram HTML.
pub fn format_notification(notification: &Notification) -> String {
    match &notification.notification_type {
        NotificationType::LargeTrade {
            token_label,
            direction,
            wallet,
            ui_amount,
            usd_value,
            signature,
            ..
        } => {
            let (emoji, action) = match direction {
                Direction::Buy => ("🟢", "Buy"),
                Direction::Sell => ("🔴", "Sell"),
            };
            format!(
                "{} <b>{} {}</b>\n\n\
                 Wallet: <code>{}</code>\n\
                 Amount: {:.4} {}\n\
                 Value: ${:.2}\n\
                 <a href=\"{}\">View transaction</a>",
                emoji,
                token_label,
                action,
                truncate_address(wallet),
                ui_amount,
                token_label,
                usd_value,
                signature_url(signature)
            )
        }

        NotificationType::CumulativeVolume {
            token_label,
            direction,
            cumulative_usd,
            window_minutes,
            latest_wallet,
            latest_usd,
            signature,
        } => {
            let emoji = match direction {
                Direction::Buy => "📈",
                Direction::Sell => "📉",
            };
            format!(
                "{} <b>{} {} volume</b>\n\n\
                 ${:.2} over the last {} min\n\
                 Latest: <code>{}</code> (${:.2})\n\
                 <a href=\"{}\">View transaction</a>",
                emoji,
                token_label,
                direction,
                cumulative_usd,
                window_minutes,
                truncate_address(latest_wallet),
                latest_usd,
                signature_url(signature)
            )
        }

        NotificationType::SequentialSells {
            token_label,
            wallet,
            streak,
            latest_usd,
            threshold_usd,
            signature,
        } => {
            format!(
                "🚨 <b>{} sequential sells</b>\n\n\
                 Wallet <code>{}</code> sold {} times in a row\n\
                 Latest sell: ${:.2} (each ≥ ${:.0})\n\
                 <a href=\"{}\">View transaction</a>",
                token_label,
                truncate_address(wallet),
                streak,
                latest_usd,
                threshold_usd,
                signature_url(signature)
            )
        }

        NotificationType::PeriodSummary {
            token_label,
            period_minutes,
            buys_usd,
            sells_usd,
        } => {
            let net = buys_usd - sells_usd;
            let emoji = if net >= 0.0 { "📊" } else { "📉" };
            format!(
                "{} <b>{} - last {} min</b>\n\n\
                 Buys: ${:.2}\n\
                 Sells: ${:.2}\n\
                 Net: {}{:.2}",
                emoji,
                token_label,
                period_minutes,
                buys_usd,
                sells_usd,
                if net >= 0.0 { "+$" } else { "-$" },
                net.abs()
            )
        }

        NotificationType::ServiceStarted { version } => {
            format!("🚀 <b>mintwatch started</b>\n\nVersion: {}", version)
        }

        NotificationType::ServiceStopped { reason } => {
            format!("🛑 <b>mintwatch stopped</b>\n\nReason: {}", reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TransferEvent;

    fn event(direction: Direction) -> TransferEvent {
        TransferEvent {
            wallet: "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263".to_string(),
            mint: "M".to_string(),
            amount: 1_500_000_000,
            decimals: 9,
            signature: "5h2sig".to_string(),
            timestamp: 1_700_000_000,
            direction,
            usd_value: Some(612.5),
        }
    }

    #[test]
    fn buy_message_contains_value_and_link() {
        let n = Notification::large_trade("BONK", &event(Direction::Buy), 612.5);
        let text = format_notification(&n);
        assert!(text.contains("🟢"));
        assert!(text.contains("BONK Buy"));
        assert!(text.contains("$612.50"));
        assert!(text.contains("solscan.io/tx/5h2sig"));
        assert!(text.contains("DezXAZ...B263"));
    }

    #[test]
    fn sell_message_uses_sell_marker() {
        let n = Notification::large_trade("BONK", &event(Direction::Sell), 612.5);
        let text = format_notification(&n);
        assert!(text.contains("🔴"));
        assert!(text.contains("BONK Sell"));
    }

    #[test]
    fn cumulative_message_reports_window_minutes() {
        let n = Notification::cumulative_volume("BONK", &event(Direction::Buy), 1234.0, 3600, 612.5);
        let text = format_notification(&n);
        assert!(text.contains("60 min"));
        assert!(text.contains("$1234.00"));
    }

    #[test]
    fn summary_reports_net_flow() {
        let n = Notification::period_summary("BONK", 30, 1000.0, 250.0);
        let text = format_notification(&n);
        assert!(text.contains("last 30 min"));
        assert!(text.contains("+$750.00"));

        let n = Notification::period_summary("BONK", 30, 100.0, 400.0);
        let text = format_notification(&n);
        assert!(text.contains("-$300.00"));
    }

    #[test]
    fn rejects_empty_credentials() {
        assert!(TelegramNotifier::new("", 1).is_err());
        assert!(TelegramNotifier::new("123:abc", 0).is_err());
    }
}
