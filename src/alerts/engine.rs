//! The rule engine. Each parsed event runs through four rules in order;
//! a failed dispatch is logged and the remaining rules still run. Window
//! state lives behind [`WindowStore`], delivery behind [`AlertSink`], so
//! the whole engine is testable in memory.

use std::sync::Arc;

use crate::alerts::{cumulative_cooldown_key, SEQUENTIAL_SELLS_TRIGGER};
use crate::config::{AlertConfig, TokenConfig};
use crate::events::{parser, Direction, TransferEvent, WebhookPayload};
use crate::logger::{self, LogTag};
use crate::notifications::{AlertSink, Notification};
use crate::prices::PriceOracle;
use crate::store::WindowStore;

pub struct AlertEngine {
    alerts: AlertConfig,
    token: TokenConfig,
    store: Arc<dyn WindowStore>,
    oracle: Arc<PriceOracle>,
    sink: Arc<dyn AlertSink>,
}

impl AlertEngine {
    pub fn new(
        alerts: AlertConfig,
        token: TokenConfig,
        store: Arc<dyn WindowStore>,
        oracle: Arc<PriceOracle>,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            alerts,
            token,
            store,
            oracle,
            sink,
        }
    }

    /// Parse one webhook payload and evaluate every resulting event.
    pub async fn process_payload(&self, payload: WebhookPayload) {
        for event in parser::parse_payload(&payload, &self.token.mint) {
            self.process_event(event).await;
        }
    }

    /// Run the rule set for one event. Store failures abort this event
    /// only; dispatch failures are logged and evaluation continues.
    pub async fn process_event(&self, mut event: TransferEvent) {
        event.usd_value = self
            .oracle
            .usd_value(&event.mint, event.amount, event.decimals)
            .await;

        logger::info(
            LogTag::Alerts,
            &format!(
                "{} {} by {} ({} raw, usd={})",
                self.token.label,
                event.direction,
                event.wallet,
                event.amount,
                event
                    .usd_value
                    .map(|v| format!("{:.2}", v))
                    .unwrap_or_else(|| "n/a".to_string()),
            ),
        );

        self.rule_chat_announce(&event).await;
        self.rule_push_single(&event).await;
        self.rule_push_cumulative(&event).await;
        if self.alerts.five_sells_enabled {
            self.rule_sequential_sells(&event).await;
        }
    }

    /// R1: broadcast large trades to the chat channel. No cooldown.
    async fn rule_chat_announce(&self, event: &TransferEvent) {
        let usd = match event.usd_value {
            Some(usd) if usd >= self.alerts.chat_threshold_usd => usd,
            _ => return,
        };
        let notification = Notification::large_trade(&self.token.label, event, usd);
        if let Err(e) = self.sink.chat_alert(&notification).await {
            logger::error(
                LogTag::Alerts,
                &format!("Chat alert for {} failed: {}", event.signature, e),
            );
        }
    }

    /// R2: push a single large trade to general subscribers. No cooldown.
    async fn rule_push_single(&self, event: &TransferEvent) {
        let usd = match event.usd_value {
            Some(usd) if usd >= self.alerts.single_threshold_usd => usd,
            _ => return,
        };
        let notification = Notification::large_trade(&self.token.label, event, usd);
        if let Err(e) = self.sink.push_general(&notification).await {
            logger::error(
                LogTag::Alerts,
                &format!("Single-trade push for {} failed: {}", event.signature, e),
            );
        }
    }

    /// R3: cumulative window volume with cooldown. The window update
    /// happens unconditionally so suppressed periods still accumulate.
    async fn rule_push_cumulative(&self, event: &TransferEvent) {
        let usd = match event.usd_value {
            Some(usd) => usd,
            None => return,
        };

        let cumulative = match self
            .store
            .add_amount_to_window(&event.mint, event.direction, usd, event.timestamp)
            .await
        {
            Ok(cumulative) => cumulative,
            Err(e) => {
                logger::error(
                    LogTag::Alerts,
                    &format!("Window update for {} failed: {}", event.signature, e),
                );
                return;
            }
        };

        if cumulative < self.alerts.cumulative_threshold_usd {
            return;
        }

        let cooldown_key = cumulative_cooldown_key(&event.mint, event.direction);
        match self.store.is_in_cooldown(&cooldown_key).await {
            Ok(true) => {
                logger::debug(
                    LogTag::Alerts,
                    &format!(
                        "Cumulative {} {} at ${:.2}, suppressed by cooldown",
                        event.mint, event.direction, cumulative
                    ),
                );
                return;
            }
            Ok(false) => {}
            Err(e) => {
                logger::error(
                    LogTag::Alerts,
                    &format!("Cooldown check for {} failed: {}", cooldown_key, e),
                );
                return;
            }
        }

        let notification = Notification::cumulative_volume(
            &self.token.label,
            event,
            cumulative,
            self.alerts.window_seconds,
            usd,
        );
        if let Err(e) = self.sink.push_general(&notification).await {
            logger::error(
                LogTag::Alerts,
                &format!("Cumulative push for {} failed: {}", event.signature, e),
            );
        }
        if let Err(e) = self
            .store
            .set_cooldown(&cooldown_key, self.alerts.window_seconds)
            .await
        {
            logger::error(
                LogTag::Alerts,
                &format!("Cooldown set for {} failed: {}", cooldown_key, e),
            );
        }
    }

    /// R4: a buy resets the wallet's streak; a qualifying sell bumps it
    /// and fires at the trigger count, then the streak starts over.
    async fn rule_sequential_sells(&self, event: &TransferEvent) {
        match event.direction {
            Direction::Buy => {
                if let Err(e) = self.store.reset_sequential_sells(&event.wallet).await {
                    logger::error(
                        LogTag::Alerts,
                        &format!("Sell-streak reset for {} failed: {}", event.wallet, e),
                    );
                }
            }
            Direction::Sell => {
                let usd = match event.usd_value {
                    Some(usd) if usd >= self.alerts.five_sells_threshold_usd => usd,
                    _ => return,
                };

                let count = match self.store.increment_sequential_sells(&event.wallet).await {
                    Ok(count) => count,
                    Err(e) => {
                        logger::error(
                            LogTag::Alerts,
                            &format!("Sell-streak increment for {} failed: {}", event.wallet, e),
                        );
                        return;
                    }
                };

                if count < SEQUENTIAL_SELLS_TRIGGER {
                    logger::debug(
                        LogTag::Alerts,
                        &format!("{} sell streak at {}", event.wallet, count),
                    );
                    return;
                }

                let notification = Notification::sequential_sells(
                    &self.token.label,
                    event,
                    count,
                    usd,
                    self.alerts.five_sells_threshold_usd,
                );
                if let Err(e) = self.sink.push_sequential_sells(&notification).await {
                    logger::error(
                        LogTag::Alerts,
                        &format!("Sequential-sells push for {} failed: {}", event.wallet, e),
                    );
                }
                if let Err(e) = self.store.reset_sequential_sells(&event.wallet).await {
                    logger::error(
                        LogTag::Alerts,
                        &format!("Sell-streak reset for {} failed: {}", event.wallet, e),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriceConfig;
    use crate::scheduler::MAX_SUMMARY_PERIOD_SECS;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const MINT: &str = "TestMint1111111111111111111111111111111111";

    /// In-memory window store mirroring the Redis semantics: eviction by
    /// the retention horizon, alert sums bounded to the window.
    struct MemoryWindowStore {
        window: u64,
        retention: u64,
        windows: Mutex<HashMap<String, Vec<(i64, f64)>>>,
        cooldowns: Mutex<HashMap<String, u64>>,
        streaks: Mutex<HashMap<String, u64>>,
    }

    impl MemoryWindowStore {
        fn new(window: u64, retention: u64) -> Self {
            Self {
                window,
                retention,
                windows: Mutex::new(HashMap::new()),
                cooldowns: Mutex::new(HashMap::new()),
                streaks: Mutex::new(HashMap::new()),
            }
        }

        fn clear_cooldown(&self, key: &str) {
            self.cooldowns.lock().unwrap().remove(key);
        }
    }

    #[async_trait]
    impl WindowStore for MemoryWindowStore {
        async fn add_amount_to_window(
            &self,
            mint: &str,
            direction: Direction,
            usd_amount: f64,
            ts: i64,
        ) -> Result<f64> {
            let key = format!("{}:{}", mint, direction.as_str());
            let mut windows = self.windows.lock().unwrap();
            let entries = windows.entry(key).or_default();
            entries.retain(|(entry_ts, _)| *entry_ts >= ts - self.retention as i64);
            entries.push((ts, usd_amount));
            Ok(entries
                .iter()
                .filter(|(entry_ts, _)| *entry_ts >= ts - self.window as i64)
                .map(|(_, amount)| amount)
                .sum())
        }

        async fn cumulative_amount(
            &self,
            mint: &str,
            direction: Direction,
            now: i64,
            period_seconds: u64,
        ) -> Result<f64> {
            let key = format!("{}:{}", mint, direction.as_str());
            let windows = self.windows.lock().unwrap();
            Ok(windows
                .get(&key)
                .map(|entries| {
                    entries
                        .iter()
                        .filter(|(ts, _)| *ts >= now - period_seconds as i64)
                        .map(|(_, amount)| amount)
                        .sum()
                })
                .unwrap_or(0.0))
        }

        async fn is_in_cooldown(&self, key: &str) -> Result<bool> {
            Ok(self.cooldowns.lock().unwrap().contains_key(key))
        }

        async fn set_cooldown(&self, key: &str, seconds: u64) -> Result<()> {
            self.cooldowns
                .lock()
                .unwrap()
                .insert(key.to_string(), seconds);
            Ok(())
        }

        async fn increment_sequential_sells(&self, wallet: &str) -> Result<u64> {
            let mut streaks = self.streaks.lock().unwrap();
            let count = streaks.entry(wallet.to_string()).or_insert(0);
            *count += 1;
            Ok(*count)
        }

        async fn reset_sequential_sells(&self, wallet: &str) -> Result<()> {
            self.streaks.lock().unwrap().remove(wallet);
            Ok(())
        }

        async fn get_sequential_sells(&self, wallet: &str) -> Result<u64> {
            Ok(*self.streaks.lock().unwrap().get(wallet).unwrap_or(&0))
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Records every dispatched notification with its channel.
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(&'static str, Notification)>>,
    }

    impl RecordingSink {
        fn channels(&self) -> Vec<&'static str> {
            self.sent.lock().unwrap().iter().map(|(c, _)| *c).collect()
        }

        fn count(&self, channel: &str) -> usize {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _)| *c == channel)
                .count()
        }
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn chat_alert(&self, notification: &Notification) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(("chat", notification.clone()));
            Ok(())
        }

        async fn push_general(&self, notification: &Notification) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(("push", notification.clone()));
            Ok(())
        }

        async fn push_sequential_sells(&self, notification: &Notification) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(("sells", notification.clone()));
            Ok(())
        }
    }

    struct Harness {
        engine: AlertEngine,
        store: Arc<MemoryWindowStore>,
        sink: Arc<RecordingSink>,
        oracle: Arc<PriceOracle>,
    }

    async fn harness(price_usd: Option<f64>) -> Harness {
        let alerts = AlertConfig::default();
        let token = TokenConfig {
            mint: MINT.to_string(),
            label: "TEST".to_string(),
            decimals: 0,
        };
        let store = Arc::new(MemoryWindowStore::new(
            alerts.window_seconds,
            alerts.window_seconds.max(MAX_SUMMARY_PERIOD_SECS),
        ));
        let sink = Arc::new(RecordingSink::default());

        // An unroutable quote endpoint makes cache misses fail fast, so
        // `None` here means "usd unresolvable".
        let oracle = Arc::new(
            PriceOracle::new(&PriceConfig {
                api_url: "http://127.0.0.1:9".to_string(),
                cache_ttl_secs: 600,
                timeout_seconds: 1,
            })
            .unwrap(),
        );
        if let Some(price) = price_usd {
            oracle.seed_cache(MINT, price).await;
        }

        let engine = AlertEngine::new(
            alerts,
            token,
            store.clone(),
            oracle.clone(),
            sink.clone(),
        );
        Harness {
            engine,
            store,
            sink,
            oracle,
        }
    }

    fn event(direction: Direction, amount: u64, ts: i64) -> TransferEvent {
        TransferEvent {
            wallet: "W1".to_string(),
            mint: MINT.to_string(),
            amount,
            decimals: 0,
            signature: format!("sig-{}-{}", amount, ts),
            timestamp: ts,
            direction,
            usd_value: None,
        }
    }

    fn event_for(wallet: &str, direction: Direction, amount: u64, ts: i64) -> TransferEvent {
        let mut e = event(direction, amount, ts);
        e.wallet = wallet.to_string();
        e
    }

    #[tokio::test]
    async fn chat_and_push_thresholds_are_independent() {
        // price 1.0 so raw amount == usd
        let h = harness(Some(1.0)).await;

        // 600 >= both thresholds: chat + single push + cumulative push
        h.engine.process_event(event(Direction::Buy, 600, 1000)).await;
        assert_eq!(h.sink.count("chat"), 1);
        assert!(h.sink.count("push") >= 1);

        // 350: single push only (chat threshold is 500)
        let h = harness(Some(1.0)).await;
        h.engine.process_event(event(Direction::Buy, 350, 1000)).await;
        assert_eq!(h.sink.count("chat"), 0);
        assert!(h.sink.count("push") >= 1);

        // 100: neither, and cumulative stays below threshold
        let h = harness(Some(1.0)).await;
        h.engine.process_event(event(Direction::Buy, 100, 1000)).await;
        assert!(h.sink.channels().is_empty());
    }

    #[tokio::test]
    async fn cumulative_rule_fires_once_then_cools_down() {
        let h = harness(Some(1.0)).await;

        // Keep each event below the single thresholds so only the
        // cumulative rule can dispatch.
        h.engine.process_event(event(Direction::Buy, 100, 1000)).await;
        h.engine.process_event(event(Direction::Buy, 100, 1100)).await;
        assert_eq!(h.sink.count("push"), 0);

        // Third buy pushes the window to 350 >= 300: one cumulative push.
        h.engine.process_event(event(Direction::Buy, 150, 1200)).await;
        assert_eq!(h.sink.count("push"), 1);
        let key = cumulative_cooldown_key(MINT, Direction::Buy);
        assert!(h.store.is_in_cooldown(&key).await.unwrap());

        // Fourth buy: window grows but the cooldown suppresses dispatch.
        h.engine.process_event(event(Direction::Buy, 50, 1250)).await;
        assert_eq!(h.sink.count("push"), 1);
        let sum = h
            .store
            .cumulative_amount(MINT, Direction::Buy, 1250, 3600)
            .await
            .unwrap();
        assert_eq!(sum, 400.0);

        // Cooldown expiry + old entries out of the window: fires again.
        h.store.clear_cooldown(&key);
        h.engine
            .process_event(event(Direction::Buy, 299, 6000))
            .await;
        assert_eq!(h.sink.count("push"), 1); // 299 alone is below 300
        h.engine
            .process_event(event(Direction::Buy, 10, 6010))
            .await;
        assert_eq!(h.sink.count("push"), 2);
    }

    #[tokio::test]
    async fn cumulative_window_updates_even_while_suppressed() {
        let h = harness(Some(1.0)).await;
        h.engine.process_event(event(Direction::Buy, 400, 1000)).await;
        h.engine.process_event(event(Direction::Buy, 100, 1100)).await;
        let sum = h
            .store
            .cumulative_amount(MINT, Direction::Buy, 1100, 3600)
            .await
            .unwrap();
        assert_eq!(sum, 500.0);
    }

    #[tokio::test]
    async fn summary_periods_see_entries_older_than_the_alert_window() {
        let h = harness(Some(1.0)).await;
        h.engine.process_event(event(Direction::Buy, 50, 1000)).await;
        h.engine.process_event(event(Direction::Buy, 70, 5000)).await;

        // The first buy left the 1h alert window but is still retained,
        // so the 4h summary counts it while the 1h read does not.
        let hour = h
            .store
            .cumulative_amount(MINT, Direction::Buy, 5000, 3600)
            .await
            .unwrap();
        let four_hours = h
            .store
            .cumulative_amount(MINT, Direction::Buy, 5000, MAX_SUMMARY_PERIOD_SECS)
            .await
            .unwrap();
        assert_eq!(hour, 70.0);
        assert_eq!(four_hours, 120.0);
    }

    #[tokio::test]
    async fn buys_and_sells_accumulate_separately() {
        let h = harness(Some(1.0)).await;
        h.engine.process_event(event(Direction::Buy, 100, 1000)).await;
        h.engine.process_event(event(Direction::Sell, 40, 1001)).await;
        let buys = h
            .store
            .cumulative_amount(MINT, Direction::Buy, 1001, 3600)
            .await
            .unwrap();
        let sells = h
            .store
            .cumulative_amount(MINT, Direction::Sell, 1001, 3600)
            .await
            .unwrap();
        assert_eq!(buys, 100.0);
        assert_eq!(sells, 40.0);
    }

    #[tokio::test]
    async fn five_qualifying_sells_trigger_and_reset() {
        let h = harness(Some(1.0)).await;
        for (i, amount) in [400u64, 350, 500, 400, 350].iter().enumerate() {
            h.engine
                .process_event(event_for("W2", Direction::Sell, *amount, 1000 + i as i64))
                .await;
        }
        assert_eq!(h.sink.count("sells"), 1);
        assert_eq!(h.store.get_sequential_sells("W2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn a_buy_resets_the_sell_streak() {
        let h = harness(Some(1.0)).await;
        for i in 0..3 {
            h.engine
                .process_event(event_for("W2", Direction::Sell, 400, 1000 + i))
                .await;
        }
        assert_eq!(h.store.get_sequential_sells("W2").await.unwrap(), 3);

        // Any buy by the wallet clears the streak, size irrelevant.
        h.engine
            .process_event(event_for("W2", Direction::Buy, 10, 1010))
            .await;
        assert_eq!(h.store.get_sequential_sells("W2").await.unwrap(), 0);

        h.engine
            .process_event(event_for("W2", Direction::Sell, 400, 1020))
            .await;
        assert_eq!(h.store.get_sequential_sells("W2").await.unwrap(), 1);
        assert_eq!(h.sink.count("sells"), 0);
    }

    #[tokio::test]
    async fn small_sells_do_not_extend_the_streak() {
        let h = harness(Some(1.0)).await;
        h.engine
            .process_event(event_for("W2", Direction::Sell, 400, 1000))
            .await;
        h.engine
            .process_event(event_for("W2", Direction::Sell, 100, 1001))
            .await;
        assert_eq!(h.store.get_sequential_sells("W2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn streaks_are_per_wallet() {
        let h = harness(Some(1.0)).await;
        h.engine
            .process_event(event_for("W2", Direction::Sell, 400, 1000))
            .await;
        h.engine
            .process_event(event_for("W3", Direction::Sell, 400, 1001))
            .await;
        assert_eq!(h.store.get_sequential_sells("W2").await.unwrap(), 1);
        assert_eq!(h.store.get_sequential_sells("W3").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unresolved_price_skips_usd_rules_without_side_effects() {
        let h = harness(None).await;
        h.engine
            .process_event(event(Direction::Sell, 1_000_000, 1000))
            .await;
        assert!(h.sink.channels().is_empty());
        let sum = h
            .store
            .cumulative_amount(MINT, Direction::Sell, 1000, 3600)
            .await
            .unwrap();
        assert_eq!(sum, 0.0);
        // Sell streak untouched: the qualifying threshold needs a price.
        assert_eq!(h.store.get_sequential_sells("W1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn disabled_sequential_rule_never_counts() {
        let mut alerts = AlertConfig::default();
        alerts.five_sells_enabled = false;
        let token = TokenConfig {
            mint: MINT.to_string(),
            label: "TEST".to_string(),
            decimals: 0,
        };
        let store = Arc::new(MemoryWindowStore::new(
            alerts.window_seconds,
            alerts.window_seconds.max(MAX_SUMMARY_PERIOD_SECS),
        ));
        let sink = Arc::new(RecordingSink::default());
        let oracle = Arc::new(
            PriceOracle::new(&PriceConfig {
                api_url: "http://127.0.0.1:9".to_string(),
                cache_ttl_secs: 600,
                timeout_seconds: 1,
            })
            .unwrap(),
        );
        oracle.seed_cache(MINT, 1.0).await;
        let engine = AlertEngine::new(alerts, token, store.clone(), oracle, sink.clone());

        for i in 0..6 {
            engine
                .process_event(event_for("W2", Direction::Sell, 400, 1000 + i))
                .await;
        }
        assert_eq!(store.get_sequential_sells("W2").await.unwrap(), 0);
        assert_eq!(sink.count("sells"), 0);
    }

    #[tokio::test]
    async fn payload_processing_classifies_and_prices() {
        let h = harness(Some(1.0)).await;
        let raw = serde_json::json!({
            "signature": "s1",
            "timestamp": 1_700_000_000i64,
            "feePayer": "W1",
            "tokenTransfers": [
                {"fromUserAccount": "X", "toUserAccount": "W1", "mint": MINT, "tokenAmount": 600}
            ]
        });
        let payload: WebhookPayload = serde_json::from_value(raw).unwrap();
        h.engine.process_payload(payload).await;
        assert_eq!(h.sink.count("chat"), 1);
        // The oracle was consulted via the cache only.
        assert_eq!(h.oracle.price_usd(MINT).await, Some(1.0));
    }
}
