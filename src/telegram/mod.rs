//! Telegram bot command surface.
//!
//! A long-poll loop that lets users manage the tracked-wallet list and
//! their own subscriptions. This is the only mutation path into the
//! registry; the pipeline just reads it. Wallet mutations are restricted
//! to the configured admin ids.
//!
//! Commands:
//! - `/track <address>` / `/untrack <address>` (admins)
//! - `/wallets` - list tracked wallets
//! - `/subscribe <pushover_key>` / `/unsubscribe`
//! - `/subscribesells <pushover_key>` / `/unsubscribesells`
//! - `/summaries on|off` - periodic summary DMs
//! - `/status`, `/help`

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, UpdateKind};
use tokio_util::sync::CancellationToken;

use crate::config::TelegramConfig;
use crate::db::Database;
use crate::global;
use crate::logger::{self, LogTag};
use crate::VERSION;

pub struct CommandHandler {
    bot: Bot,
    admin_ids: Vec<i64>,
    db: Arc<Database>,
}

impl CommandHandler {
    pub fn new(config: &TelegramConfig, db: Arc<Database>) -> Result<Self, String> {
        if config.bot_token.is_empty() {
            return Err("Bot token is empty".to_string());
        }
        Ok(Self {
            bot: Bot::new(config.bot_token.clone()),
            admin_ids: config.admin_ids.clone(),
            db,
        })
    }

    /// Run the long-poll loop until shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        logger::info(LogTag::Telegram, "Command handler started");
        let mut offset: i32 = 0;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    logger::info(LogTag::Telegram, "Command handler stopping");
                    break;
                }
                updates = self.bot.get_updates().offset(offset).timeout(10).send() => {
                    match updates {
                        Ok(updates) => {
                            for update in updates {
                                offset = offset.max(update.id.0 as i32 + 1);
                                if let UpdateKind::Message(message) = update.kind {
                                    self.handle_message(&message).await;
                                }
                            }
                        }
                        Err(e) => {
                            // Connection hiccups are routine during long polling.
                            logger::debug(
                                LogTag::Telegram,
                                &format!("getUpdates failed: {}", e),
                            );
                            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_message(&self, message: &Message) {
        let text = match message.text() {
            Some(text) => text.trim(),
            None => return,
        };
        if !text.starts_with('/') {
            return;
        }
        let user_id = match message.from.as_ref() {
            Some(user) => user.id.0 as i64,
            None => return,
        };

        let response = self.dispatch_command(text, user_id);
        if let Err(e) = self
            .bot
            .send_message(message.chat.id, &response)
            .parse_mode(ParseMode::Html)
            .await
        {
            logger::error(
                LogTag::Telegram,
                &format!("Failed to answer command '{}': {}", text, e),
            );
        } else {
            logger::info(
                LogTag::Telegram,
                &format!("Handled command {} from {}", text.split_whitespace().next().unwrap_or(""), user_id),
            );
        }
    }

    fn dispatch_command(&self, text: &str, user_id: i64) -> String {
        let mut parts = text.split_whitespace();
        let command = parts.next().unwrap_or("");
        let arg = parts.next().unwrap_or("");

        match command {
            "/track" => self.cmd_track(user_id, arg),
            "/untrack" => self.cmd_untrack(user_id, arg),
            "/wallets" => self.cmd_wallets(),
            "/subscribe" => self.cmd_subscribe(user_id, arg),
            "/unsubscribe" => self.cmd_unsubscribe(user_id),
            "/subscribesells" => self.cmd_subscribe_sells(user_id, arg),
            "/unsubscribesells" => self.cmd_unsubscribe_sells(user_id),
            "/summaries" => self.cmd_summaries(user_id, arg),
            "/status" => self.cmd_status(),
            "/help" | "/start" => help_text(),
            _ => format!(
                "❓ Unknown command: {}\n\nUse /help to see available commands.",
                command
            ),
        }
    }

    fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    fn cmd_track(&self, user_id: i64, address: &str) -> String {
        if !self.is_admin(user_id) {
            return "⛔ Only admins can modify the wallet list.".to_string();
        }
        if address.is_empty() {
            return "Usage: /track &lt;wallet address&gt;".to_string();
        }
        match self.db.add_wallet(address, user_id) {
            Ok(true) => format!("✅ Now tracking <code>{}</code>", address),
            Ok(false) => format!("ℹ️ <code>{}</code> is already tracked", address),
            Err(e) => format!("❌ Failed to add wallet: {}", e),
        }
    }

    fn cmd_untrack(&self, user_id: i64, address: &str) -> String {
        if !self.is_admin(user_id) {
            return "⛔ Only admins can modify the wallet list.".to_string();
        }
        if address.is_empty() {
            return "Usage: /untrack &lt;wallet address&gt;".to_string();
        }
        match self.db.remove_wallet(address) {
            Ok(true) => format!("✅ Stopped tracking <code>{}</code>", address),
            Ok(false) => format!("ℹ️ <code>{}</code> was not tracked", address),
            Err(e) => format!("❌ Failed to remove wallet: {}", e),
        }
    }

    fn cmd_wallets(&self) -> String {
        let count = match self.db.wallet_count() {
            Ok(count) => count,
            Err(e) => return format!("❌ Failed to read wallets: {}", e),
        };
        if count == 0 {
            return "📭 No wallets tracked - every wallet is currently watched.".to_string();
        }
        let wallets = match self.db.list_wallets(0, 20) {
            Ok(wallets) => wallets,
            Err(e) => return format!("❌ Failed to read wallets: {}", e),
        };
        let mut response = format!("👛 <b>Tracked wallets ({})</b>\n\n", count);
        for wallet in &wallets {
            response.push_str(&format!("<code>{}</code>\n", wallet.address));
        }
        if count as usize > wallets.len() {
            response.push_str(&format!("... and {} more", count as usize - wallets.len()));
        }
        response
    }

    fn cmd_subscribe(&self, user_id: i64, push_key: &str) -> String {
        if push_key.is_empty() {
            return "Usage: /subscribe &lt;pushover user key&gt;".to_string();
        }
        match self.db.add_push_subscription(user_id, push_key) {
            Ok(()) => "✅ Subscribed to large-trade push alerts.".to_string(),
            Err(e) => format!("❌ Failed to subscribe: {}", e),
        }
    }

    fn cmd_unsubscribe(&self, user_id: i64) -> String {
        match self.db.remove_push_subscription(user_id) {
            Ok(true) => "✅ Unsubscribed from push alerts.".to_string(),
            Ok(false) => "ℹ️ You were not subscribed.".to_string(),
            Err(e) => format!("❌ Failed to unsubscribe: {}", e),
        }
    }

    fn cmd_subscribe_sells(&self, user_id: i64, push_key: &str) -> String {
        if push_key.is_empty() {
            return "Usage: /subscribesells &lt;pushover user key&gt;".to_string();
        }
        match self.db.add_sequential_sells_subscription(user_id, push_key) {
            Ok(()) => "✅ Subscribed to sequential-sell push alerts.".to_string(),
            Err(e) => format!("❌ Failed to subscribe: {}", e),
        }
    }

    fn cmd_unsubscribe_sells(&self, user_id: i64) -> String {
        match self.db.remove_sequential_sells_subscription(user_id) {
            Ok(true) => "✅ Unsubscribed from sequential-sell alerts.".to_string(),
            Ok(false) => "ℹ️ You were not subscribed.".to_string(),
            Err(e) => format!("❌ Failed to unsubscribe: {}", e),
        }
    }

    fn cmd_summaries(&self, user_id: i64, arg: &str) -> String {
        match arg {
            "on" => match self.db.add_chat_subscriber(user_id) {
                Ok(true) => "✅ You will receive periodic volume summaries.".to_string(),
                Ok(false) => "ℹ️ Summaries were already on.".to_string(),
                Err(e) => format!("❌ Failed to enable summaries: {}", e),
            },
            "off" => match self.db.remove_chat_subscriber(user_id) {
                Ok(true) => "✅ Summaries disabled.".to_string(),
                Ok(false) => "ℹ️ Summaries were already off.".to_string(),
                Err(e) => format!("❌ Failed to disable summaries: {}", e),
            },
            _ => "Usage: /summaries on|off".to_string(),
        }
    }

    fn cmd_status(&self) -> String {
        let wallet_count = self.db.wallet_count().unwrap_or(0);
        let subscriber_count = self.db.subscriber_count().unwrap_or(0);
        format!(
            "🟢 <b>mintwatch status</b>\n\n\
             Version: {}\n\
             Uptime: {}\n\
             Tracked wallets: {}\n\
             Push subscribers: {}",
            VERSION,
            format_duration(global::uptime_seconds()),
            wallet_count,
            subscriber_count
        )
    }
}

fn help_text() -> String {
    "🤖 <b>mintwatch commands</b>\n\n\
     /track &lt;address&gt; - Track a wallet (admin)\n\
     /untrack &lt;address&gt; - Stop tracking a wallet (admin)\n\
     /wallets - List tracked wallets\n\
     /subscribe &lt;key&gt; - Push alerts for large trades\n\
     /unsubscribe - Stop push alerts\n\
     /subscribesells &lt;key&gt; - Push alerts for sequential sells\n\
     /unsubscribesells - Stop sequential-sell alerts\n\
     /summaries on|off - Periodic volume summary DMs\n\
     /status - Service status\n\
     /help - This message"
        .to_string()
}

/// Format seconds into a human-readable duration.
fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramConfig;

    fn handler(admin_ids: Vec<i64>) -> CommandHandler {
        CommandHandler::new(
            &TelegramConfig {
                bot_token: "123:test".to_string(),
                channel_id: -100,
                admin_ids,
                commands_enabled: true,
            },
            Arc::new(Database::open_in_memory().unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn track_requires_admin() {
        let h = handler(vec![1]);
        let denied = h.dispatch_command("/track W1", 2);
        assert!(denied.contains("Only admins"));
        let allowed = h.dispatch_command("/track W1", 1);
        assert!(allowed.contains("Now tracking"));
        assert_eq!(h.db.wallet_count().unwrap(), 1);
    }

    #[test]
    fn duplicate_track_reports_noop() {
        let h = handler(vec![1]);
        h.dispatch_command("/track W1", 1);
        let second = h.dispatch_command("/track W1", 1);
        assert!(second.contains("already tracked"));
    }

    #[test]
    fn subscribe_registers_push_key() {
        let h = handler(vec![]);
        let response = h.dispatch_command("/subscribe uQiRzpo4DXghDmr9QzzfQu27cmVRsG", 7);
        assert!(response.contains("Subscribed"));
        let subs = h.db.subscribers_general().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].user_id, 7);
    }

    #[test]
    fn summaries_toggle_round_trips() {
        let h = handler(vec![]);
        assert!(h.dispatch_command("/summaries on", 9).contains("periodic"));
        assert_eq!(h.db.chat_subscribers().unwrap(), vec![9]);
        assert!(h.dispatch_command("/summaries off", 9).contains("disabled"));
        assert!(h.db.chat_subscribers().unwrap().is_empty());
    }

    #[test]
    fn unknown_command_points_to_help() {
        let h = handler(vec![]);
        assert!(h.dispatch_command("/bogus", 1).contains("/help"));
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(59), "0m");
        assert_eq!(format_duration(3660), "1h 1m");
        assert_eq!(format_duration(90_061), "1d 1h 1m");
    }
}
