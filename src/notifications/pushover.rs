//! Pushover delivery channel.
//!
//! Each subscriber registered a personal user key; alerts go out with
//! high priority and a distinctive sound so they cut through.

use reqwest::Client;
use std::time::Duration;

use super::types::{truncate_address, Notification, NotificationType};
use crate::config::PushoverConfig;
use crate::events::Direction;
use crate::logger::{self, LogTag};

const REQUEST_TIMEOUT_SECS: u64 = 5;

/// High priority: bypass quiet hours, repeat sound.
const PRIORITY_HIGH: i32 = 1;

pub struct PushoverClient {
    client: Client,
    api_url: String,
    app_token: String,
    sound: String,
}

impl PushoverClient {
    pub fn new(config: &PushoverConfig) -> Result<Self, String> {
        if config.app_token.is_empty() {
            return Err("Pushover app token is empty".to_string());
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            app_token: config.app_token.clone(),
            sound: config.sound.clone(),
        })
    }

    /// Send one notification to one subscriber key.
    pub async fn send(&self, push_key: &str, notification: &Notification) -> Result<(), String> {
        let (title, message) = format_push(notification);
        self.send_raw(push_key, &title, &message).await
    }

    /// Send an arbitrary title/message pair, used by the test endpoint.
    pub async fn send_raw(&self, push_key: &str, title: &str, message: &str) -> Result<(), String> {
        let priority = PRIORITY_HIGH.to_string();
        let params = [
            ("token", self.app_token.as_str()),
            ("user", push_key),
            ("title", title),
            ("message", message),
            ("priority", priority.as_str()),
            ("sound", self.sound.as_str()),
        ];

        let response = self
            .client
            .post(&self.api_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| format!("Pushover request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Pushover rejected send: {} {}", status, body));
        }

        logger::debug(LogTag::Notify, &format!("Pushover sent: {}", title));
        Ok(())
    }
}

/// Render a notification as a Pushover title and plain-text body.
pub fn format_push(notification: &Notification) -> (String, String) {
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
            let action = match direction {
                Direction::Buy => "buy",
                Direction::Sell => "sell",
            };
            (
                format!("{} {} ${:.0}", token_label, action, usd_value),
                format!(
                    "{} {} {:.4} {} (${:.2})\n{}",
                    truncate_address(wallet),
                    if *direction == Direction::Buy {
                        "bought"
                    } else {
                        "sold"
                    },
                    ui_amount,
                    token_label,
                    usd_value,
                    super::types::signature_url(signature)
                ),
            )
        }

        NotificationType::CumulativeVolume {
            token_label,
            direction,
            cumulative_usd,
            window_minutes,
            latest_wallet,
            latest_usd,
            ..
        } => (
            format!("{} {} volume ${:.0}", token_label, direction, cumulative_usd),
            format!(
                "${:.2} of {}s in {} min. Latest: {} (${:.2})",
                cumulative_usd,
                direction,
                window_minutes,
                truncate_address(latest_wallet),
                latest_usd
            ),
        ),

        NotificationType::SequentialSells {
            token_label,
            wallet,
            streak,
            latest_usd,
            threshold_usd,
            ..
        } => (
            format!("{} sequential sells", token_label),
            format!(
                "{} sold {} times in a row, each ≥ ${:.0}. Latest: ${:.2}",
                truncate_address(wallet),
                streak,
                threshold_usd,
                latest_usd
            ),
        ),

        NotificationType::PeriodSummary {
            token_label,
            period_minutes,
            buys_usd,
            sells_usd,
        } => (
            format!("{} {}-min summary", token_label, period_minutes),
            format!("Buys ${:.2} / Sells ${:.2}", buys_usd, sells_usd),
        ),

        NotificationType::ServiceStarted { version } => (
            "mintwatch started".to_string(),
            format!("Version {}", version),
        ),

        NotificationType::ServiceStopped { reason } => {
            ("mintwatch stopped".to_string(), reason.clone())
        }
    }
}
