//! Periodic volume summaries.
//!
//! Three fixed jobs (30 min, 1 h, 4 h) read cumulative buy/sell volume
//! from the window store and DM every chat subscriber. Each job holds a
//! non-reentrant guard: if a run is still in flight when the next tick
//! arrives, the tick is skipped with a warning.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::TokenConfig;
use crate::events::Direction;
use crate::logger::{self, LogTag};
use crate::notifications::{Dispatcher, Notification};
use crate::store::WindowStore;

/// Longest summary period; window-store retention must cover it so the
/// 4h job still finds its entries.
pub const MAX_SUMMARY_PERIOD_SECS: u64 = 14_400;

/// Summary periods in seconds: every 30 minutes, hourly, every 4 hours.
const SUMMARY_PERIODS: [u64; 3] = [1800, 3600, MAX_SUMMARY_PERIOD_SECS];

pub struct Scheduler {
    token: TokenConfig,
    store: Arc<dyn WindowStore>,
    dispatcher: Arc<Dispatcher>,
}

impl Scheduler {
    pub fn new(
        token: TokenConfig,
        store: Arc<dyn WindowStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            token,
            store,
            dispatcher,
        }
    }

    /// Spawn one loop per summary period. Handles end when the token fires.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        SUMMARY_PERIODS
            .iter()
            .map(|&period_seconds| {
                let scheduler = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    scheduler.run_job_loop(period_seconds, shutdown).await;
                })
            })
            .collect()
    }

    async fn run_job_loop(self: Arc<Self>, period_seconds: u64, shutdown: CancellationToken) {
        let mut ticker = interval(Duration::from_secs(period_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so the first
        // summary goes out a full period after startup.
        ticker.tick().await;

        let running = Arc::new(AtomicBool::new(false));
        logger::info(
            LogTag::Scheduler,
            &format!("Summary job every {} min started", period_seconds / 60),
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    logger::info(
                        LogTag::Scheduler,
                        &format!("Summary job ({} min) stopping", period_seconds / 60),
                    );
                    break;
                }
                _ = ticker.tick() => {
                    if running
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                        .is_err()
                    {
                        logger::warning(
                            LogTag::Scheduler,
                            &format!(
                                "Summary job ({} min) still running, skipping this tick",
                                period_seconds / 60
                            ),
                        );
                        continue;
                    }

                    let scheduler = self.clone();
                    let running = running.clone();
                    tokio::spawn(async move {
                        scheduler.run_summary(period_seconds).await;
                        running.store(false, Ordering::SeqCst);
                    });
                }
            }
        }
    }

    /// One summary pass: read both directions, DM subscribers.
    async fn run_summary(&self, period_seconds: u64) {
        let now = Utc::now().timestamp();

        let buys = match self
            .store
            .cumulative_amount(&self.token.mint, Direction::Buy, now, period_seconds)
            .await
        {
            Ok(buys) => buys,
            Err(e) => {
                logger::error(
                    LogTag::Scheduler,
                    &format!("Buy-volume read failed, skipping summary: {}", e),
                );
                return;
            }
        };
        let sells = match self
            .store
            .cumulative_amount(&self.token.mint, Direction::Sell, now, period_seconds)
            .await
        {
            Ok(sells) => sells,
            Err(e) => {
                logger::error(
                    LogTag::Scheduler,
                    &format!("Sell-volume read failed, skipping summary: {}", e),
                );
                return;
            }
        };

        let notification = Notification::period_summary(
            &self.token.label,
            period_seconds / 60,
            buys,
            sells,
        );
        if let Err(e) = self.dispatcher.broadcast_summary(&notification).await {
            logger::error(LogTag::Scheduler, &format!("Summary broadcast failed: {}", e));
        } else {
            logger::info(
                LogTag::Scheduler,
                &format!(
                    "Summary ({} min): buys ${:.2}, sells ${:.2}",
                    period_seconds / 60,
                    buys,
                    sells
                ),
            );
        }
    }
}
