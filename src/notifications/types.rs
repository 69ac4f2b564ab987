//! Notification payloads produced by the alert engine and scheduler.
//!
//! Rendering lives with the channel (Telegram HTML, Pushover plain text);
//! these types only carry the facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{Direction, TransferEvent};

/// Types of notifications that can be dispatched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NotificationType {
    /// A single trade at or above one of the size thresholds.
    LargeTrade {
        token_label: String,
        direction: Direction,
        wallet: String,
        ui_amount: f64,
        usd_value: f64,
        signature: String,
        event_time: i64,
    },

    /// Window volume crossed the cumulative threshold.
    CumulativeVolume {
        token_label: String,
        direction: Direction,
        cumulative_usd: f64,
        window_minutes: u64,
        latest_wallet: String,
        latest_usd: f64,
        signature: String,
    },

    /// A wallet hit the sequential-sells streak.
    SequentialSells {
        token_label: String,
        wallet: String,
        streak: u64,
        latest_usd: f64,
        threshold_usd: f64,
        signature: String,
    },

    /// Periodic buy/sell volume summary for chat subscribers.
    PeriodSummary {
        token_label: String,
        period_minutes: u64,
        buys_usd: f64,
        sells_usd: f64,
    },

    /// Service startup notification.
    ServiceStarted { version: String },

    /// Service shutdown notification.
    ServiceStopped { reason: String },
}

/// A notification with its creation timestamp.
#[derive(Clone, Debug)]
pub struct Notification {
    pub notification_type: NotificationType,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(notification_type: NotificationType) -> Self {
        Self {
            notification_type,
            timestamp: Utc::now(),
        }
    }

    /// Large-trade notification from a priced event.
    pub fn large_trade(token_label: &str, event: &TransferEvent, usd_value: f64) -> Self {
        Self::new(NotificationType::LargeTrade {
            token_label: token_label.to_string(),
            direction: event.direction,
            wallet: event.wallet.clone(),
            ui_amount: event.ui_amount(),
            usd_value,
            signature: event.signature.clone(),
            event_time: event.timestamp,
        })
    }

    pub fn cumulative_volume(
        token_label: &str,
        event: &TransferEvent,
        cumulative_usd: f64,
        window_seconds: u64,
        latest_usd: f64,
    ) -> Self {
        Self::new(NotificationType::CumulativeVolume {
            token_label: token_label.to_string(),
            direction: event.direction,
            cumulative_usd,
            window_minutes: window_seconds / 60,
            latest_wallet: event.wallet.clone(),
            latest_usd,
            signature: event.signature.clone(),
        })
    }

    pub fn sequential_sells(
        token_label: &str,
        event: &TransferEvent,
        streak: u64,
        latest_usd: f64,
        threshold_usd: f64,
    ) -> Self {
        Self::new(NotificationType::SequentialSells {
            token_label: token_label.to_string(),
            wallet: event.wallet.clone(),
            streak,
            latest_usd,
            threshold_usd,
            signature: event.signature.clone(),
        })
    }

    pub fn period_summary(
        token_label: &str,
        period_minutes: u64,
        buys_usd: f64,
        sells_usd: f64,
    ) -> Self {
        Self::new(NotificationType::PeriodSummary {
            token_label: token_label.to_string(),
            period_minutes,
            buys_usd,
            sells_usd,
        })
    }

    pub fn service_started(version: &str) -> Self {
        Self::new(NotificationType::ServiceStarted {
            version: version.to_string(),
        })
    }

    pub fn service_stopped(reason: &str) -> Self {
        Self::new(NotificationType::ServiceStopped {
            reason: reason.to_string(),
        })
    }
}

/// Truncate a wallet address for display.
pub fn truncate_address(address: &str) -> String {
    if address.len() > 12 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

/// Solscan link for a transaction signature.
pub fn signature_url(signature: &str) -> String {
    format!("https://solscan.io/tx/{}", signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_addresses_only() {
        assert_eq!(truncate_address("short"), "short");
        assert_eq!(
            truncate_address("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263"),
            "DezXAZ...B263"
        );
    }

    #[test]
    fn large_trade_carries_event_fields() {
        let event = TransferEvent {
            wallet: "W1".to_string(),
            mint: "M".to_string(),
            amount: 2_000_000,
            decimals: 6,
            signature: "sig".to_string(),
            timestamp: 1_700_000_000,
            direction: Direction::Buy,
            usd_value: Some(450.0),
        };
        let n = Notification::large_trade("BONK", &event, 450.0);
        match n.notification_type {
            NotificationType::LargeTrade {
                ui_amount,
                usd_value,
                direction,
                ..
            } => {
                assert!((ui_amount - 2.0).abs() < 1e-9);
                assert_eq!(usd_value, 450.0);
                assert_eq!(direction, Direction::Buy);
            }
            _ => panic!("wrong variant"),
        }
    }
}
