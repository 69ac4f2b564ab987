//! Notification channels for mintwatch
//!
//! Two delivery paths fan out from one dispatcher:
//! - Telegram: rule alerts broadcast to the configured channel, periodic
//!   summaries DM'd to opted-in subscribers.
//! - Pushover: per-user push with high priority and a distinctive sound,
//!   split into a general class and a sequential-sells class.
//!
//! The alert engine talks to the [`AlertSink`] trait so rule evaluation
//! can be tested without touching either API.

mod dispatcher;
mod pushover;
mod telegram;
mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use dispatcher::Dispatcher;
pub use pushover::{format_push, PushoverClient};
pub use telegram::{format_notification, TelegramNotifier};
pub use types::{signature_url, truncate_address, Notification, NotificationType};

/// Channels the alert engine can invoke, one method per delivery class.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Broadcast to the chat channel.
    async fn chat_alert(&self, notification: &Notification) -> Result<()>;

    /// Fan out to every general push subscriber.
    async fn push_general(&self, notification: &Notification) -> Result<()>;

    /// Fan out to sequential-sells push subscribers only.
    async fn push_sequential_sells(&self, notification: &Notification) -> Result<()>;
}
