//! Notification fan-out.
//!
//! One dispatcher owns both channels. Per-subscriber sends run
//! concurrently and independently: a rejected push is logged with the
//! subscriber id and never aborts its siblings. Nothing is queued or
//! retried.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use super::pushover::PushoverClient;
use super::telegram::{format_notification, TelegramNotifier};
use super::types::Notification;
use super::AlertSink;
use crate::db::{Database, PushSubscription};
use crate::logger::{self, LogTag};

pub struct Dispatcher {
    telegram: TelegramNotifier,
    pushover: PushoverClient,
    db: Arc<Database>,
}

impl Dispatcher {
    pub fn new(telegram: TelegramNotifier, pushover: PushoverClient, db: Arc<Database>) -> Self {
        Self {
            telegram,
            pushover,
            db,
        }
    }

    /// Fire-and-collect fan-out to a subscriber list.
    async fn fan_out(&self, subscribers: Vec<PushSubscription>, notification: &Notification) {
        if subscribers.is_empty() {
            logger::debug(LogTag::Notify, "No push subscribers, nothing to fan out");
            return;
        }

        let sends = subscribers.iter().map(|subscriber| {
            let pushover = &self.pushover;
            async move {
                (
                    subscriber.user_id,
                    pushover.send(&subscriber.push_key, notification).await,
                )
            }
        });

        let mut delivered = 0usize;
        for (user_id, result) in join_all(sends).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => logger::warning(
                    LogTag::Notify,
                    &format!("Push to subscriber {} failed: {}", user_id, e),
                ),
            }
        }
        logger::info(
            LogTag::Notify,
            &format!("Push fan-out delivered {}/{}", delivered, subscribers.len()),
        );
    }

    /// DM the periodic summary to every chat subscriber.
    pub async fn broadcast_summary(&self, notification: &Notification) -> Result<()> {
        let subscribers = self.db.chat_subscribers()?;
        if subscribers.is_empty() {
            logger::debug(LogTag::Notify, "No chat subscribers for summary");
            return Ok(());
        }

        let message = format_notification(notification);
        let sends = subscribers.iter().map(|&user_id| {
            let telegram = &self.telegram;
            let message = message.clone();
            async move { (user_id, telegram.send_direct(user_id, &message).await) }
        });

        for (user_id, result) in join_all(sends).await {
            if let Err(e) = result {
                logger::warning(
                    LogTag::Notify,
                    &format!("Summary DM to {} failed: {}", user_id, e),
                );
            }
        }
        Ok(())
    }

    /// Send a canned message over each channel; used by the test endpoint.
    /// Returns per-channel success flags (chat, push).
    pub async fn send_test_messages(&self) -> (bool, bool) {
        let chat_ok = self
            .telegram
            .send_message("🔔 mintwatch test notification")
            .await
            .is_ok();

        let push_ok = match self.db.subscribers_general() {
            Ok(subscribers) => match subscribers.first() {
                Some(subscriber) => self
                    .pushover
                    .send_raw(
                        &subscriber.push_key,
                        "mintwatch test",
                        "Test notification from mintwatch",
                    )
                    .await
                    .is_ok(),
                None => false,
            },
            Err(_) => false,
        };

        (chat_ok, push_ok)
    }

    /// Channel broadcast outside the rule path (startup, shutdown).
    pub async fn announce(&self, notification: &Notification) {
        if let Err(e) = self.telegram.send(notification).await {
            logger::warning(LogTag::Notify, &format!("Announcement failed: {}", e));
        }
    }
}

#[async_trait]
impl AlertSink for Dispatcher {
    async fn chat_alert(&self, notification: &Notification) -> Result<()> {
        self.telegram
            .send(notification)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }

    async fn push_general(&self, notification: &Notification) -> Result<()> {
        let subscribers = self.db.subscribers_general()?;
        self.fan_out(subscribers, notification).await;
        Ok(())
    }

    async fn push_sequential_sells(&self, notification: &Notification) -> Result<()> {
        let subscribers = self.db.subscribers_sequential_sells()?;
        self.fan_out(subscribers, notification).await;
        Ok(())
    }
}
