//! Shared windowed state behind the alert rules.
//!
//! Everything the rules aggregate across events (sliding volume windows,
//! cooldown flags, sequential-sell counters) lives here rather than in
//! process memory, so several instances can share one backend.

pub mod redis;

use anyhow::Result;
use async_trait::async_trait;

use crate::events::Direction;

pub use self::redis::RedisWindowStore;

/// Windowed key-value operations required by the alert engine and the
/// scheduler. Compound operations are atomic against concurrent callers.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Evict expired entries, insert a new one and return the cumulative
    /// USD sum over the window ending at `ts`. Atomic.
    async fn add_amount_to_window(
        &self,
        mint: &str,
        direction: Direction,
        usd_amount: f64,
        ts: i64,
    ) -> Result<f64>;

    /// Cumulative USD sum over the trailing `period_seconds`, without
    /// inserting anything.
    async fn cumulative_amount(
        &self,
        mint: &str,
        direction: Direction,
        now: i64,
        period_seconds: u64,
    ) -> Result<f64>;

    async fn is_in_cooldown(&self, key: &str) -> Result<bool>;

    async fn set_cooldown(&self, key: &str, seconds: u64) -> Result<()>;

    /// Bump the per-wallet sell streak; the counter expires 24h after the
    /// first increment. Returns the new count.
    async fn increment_sequential_sells(&self, wallet: &str) -> Result<u64>;

    async fn reset_sequential_sells(&self, wallet: &str) -> Result<()>;

    async fn get_sequential_sells(&self, wallet: &str) -> Result<u64>;

    /// Backend liveness, reported by `/health`.
    async fn ping(&self) -> Result<()>;
}
