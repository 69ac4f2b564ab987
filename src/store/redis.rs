//! Redis-backed window store.
//!
//! The three compound operations (evict+insert+sum, evict+sum,
//! incr+expire) each run as one Lua script so concurrent pipeline tasks
//! never interleave inside them. Window entries live in sorted sets
//! scored by event timestamp; the USD amount rides in the member string.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::RedisConfig;
use crate::events::Direction;
use crate::logger::{self, LogTag};
use crate::store::WindowStore;

/// Sequential-sell counters expire a day after the first increment.
const SEQUENTIAL_SELLS_TTL_SECS: u64 = 86_400;

/// Slack added to the window key TTL so a quiet period does not drop
/// entries that are still inside the window.
const WINDOW_KEY_TTL_SLACK_SECS: u64 = 300;

/// Evict entries older than the retention horizon, insert the new member,
/// refresh the key TTL, then sum the amounts inside the alert window. The
/// two bounds differ: retention covers the longest summary period so the
/// scheduler still finds old entries, while the sum stays bounded to the
/// alert window.
/// KEYS[1] window key; ARGV[1] ts, ARGV[2] window secs, ARGV[3] retention
/// secs, ARGV[4] member, ARGV[5] key TTL slack secs.
const ADD_AND_SUM: &str = r#"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local retention = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', '(' .. (now - retention))
redis.call('ZADD', KEYS[1], now, ARGV[4])
redis.call('EXPIRE', KEYS[1], retention + tonumber(ARGV[5]))
local members = redis.call('ZRANGEBYSCORE', KEYS[1], now - window, '+inf')
local sum = 0
for _, member in ipairs(members) do
    local amount = tonumber(string.match(member, '([^:]+)$'))
    if amount then
        sum = sum + amount
    end
end
return tostring(sum)
"#;

/// Evict by the retention horizon, sum over the requested period. The two
/// bounds differ so short summary reads never delete entries the alert
/// window still counts.
/// KEYS[1] window key; ARGV[1] now, ARGV[2] retention secs, ARGV[3] period secs.
const EVICT_AND_SUM: &str = r#"
local now = tonumber(ARGV[1])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', '(' .. (now - tonumber(ARGV[2])))
local members = redis.call('ZRANGEBYSCORE', KEYS[1], now - tonumber(ARGV[3]), '+inf')
local sum = 0
for _, member in ipairs(members) do
    local amount = tonumber(string.match(member, '([^:]+)$'))
    if amount then
        sum = sum + amount
    end
end
return tostring(sum)
"#;

/// INCR with a TTL attached on first increment.
/// KEYS[1] counter key; ARGV[1] ttl secs.
const INCR_WITH_TTL: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], tonumber(ARGV[1]))
end
return count
"#;

/// Per-process nonce so two instances inserting at the same timestamp
/// never produce colliding members.
static PROCESS_NONCE: Lazy<u32> = Lazy::new(|| rand::thread_rng().gen());

/// Monotonic per-process insert counter, same purpose within one process.
static INSERT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Collision-safe sorted-set member: `ts:nonce-seq:amount`. The amount is
/// the last `:`-separated field, which is what the Lua scripts parse.
fn encode_member(ts: i64, usd_amount: f64) -> String {
    let seq = INSERT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}:{:x}-{}:{}", ts, *PROCESS_NONCE, seq, usd_amount)
}

pub struct RedisWindowStore {
    conn: ConnectionManager,
    key_prefix: String,
    /// Sum bound for the cumulative alert rule.
    window_seconds: u64,
    /// Eviction and TTL horizon; at least as long as the longest summary
    /// period so scheduler reads still find their entries.
    retention_seconds: u64,
    add_and_sum: Script,
    evict_and_sum: Script,
    incr_with_ttl: Script,
}

impl RedisWindowStore {
    pub async fn connect(
        config: &RedisConfig,
        window_seconds: u64,
        retention_seconds: u64,
    ) -> Result<Self> {
        let connection_string = if config.password.is_empty() {
            format!("redis://{}:{}/{}", config.host, config.port, config.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                config.password, config.host, config.port, config.db
            )
        };

        let client = Client::open(connection_string).context("Invalid Redis connection string")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        logger::info(
            LogTag::Store,
            &format!("Connected to Redis at {}:{}", config.host, config.port),
        );

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
            window_seconds,
            retention_seconds,
            add_and_sum: Script::new(ADD_AND_SUM),
            evict_and_sum: Script::new(EVICT_AND_SUM),
            incr_with_ttl: Script::new(INCR_WITH_TTL),
        })
    }

    fn window_key(&self, mint: &str, direction: Direction) -> String {
        format!("{}window:{}:{}", self.key_prefix, mint, direction.as_str())
    }

    fn cooldown_key(&self, key: &str) -> String {
        format!("{}cooldown:{}", self.key_prefix, key)
    }

    fn sells_key(&self, wallet: &str) -> String {
        format!("{}seqsells:{}", self.key_prefix, wallet)
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn add_amount_to_window(
        &self,
        mint: &str,
        direction: Direction,
        usd_amount: f64,
        ts: i64,
    ) -> Result<f64> {
        let member = encode_member(ts, usd_amount);
        let sum: String = self
            .add_and_sum
            .key(self.window_key(mint, direction))
            .arg(ts)
            .arg(self.window_seconds)
            .arg(self.retention_seconds)
            .arg(&member)
            .arg(WINDOW_KEY_TTL_SLACK_SECS)
            .invoke_async(&mut self.conn.clone())
            .await
            .context("Window insert script failed")?;
        sum.parse::<f64>()
            .with_context(|| format!("Window sum '{}' is not a number", sum))
    }

    async fn cumulative_amount(
        &self,
        mint: &str,
        direction: Direction,
        now: i64,
        period_seconds: u64,
    ) -> Result<f64> {
        let sum: String = self
            .evict_and_sum
            .key(self.window_key(mint, direction))
            .arg(now)
            .arg(self.retention_seconds)
            .arg(period_seconds)
            .invoke_async(&mut self.conn.clone())
            .await
            .context("Window read script failed")?;
        sum.parse::<f64>()
            .with_context(|| format!("Window sum '{}' is not a number", sum))
    }

    async fn is_in_cooldown(&self, key: &str) -> Result<bool> {
        let exists: bool = redis::cmd("EXISTS")
            .arg(self.cooldown_key(key))
            .query_async(&mut self.conn.clone())
            .await
            .context("Cooldown check failed")?;
        Ok(exists)
    }

    async fn set_cooldown(&self, key: &str, seconds: u64) -> Result<()> {
        let _: () = redis::cmd("SET")
            .arg(self.cooldown_key(key))
            .arg(1)
            .arg("EX")
            .arg(seconds)
            .query_async(&mut self.conn.clone())
            .await
            .context("Cooldown set failed")?;
        Ok(())
    }

    async fn increment_sequential_sells(&self, wallet: &str) -> Result<u64> {
        let count: u64 = self
            .incr_with_ttl
            .key(self.sells_key(wallet))
            .arg(SEQUENTIAL_SELLS_TTL_SECS)
            .invoke_async(&mut self.conn.clone())
            .await
            .context("Sequential-sell increment failed")?;
        Ok(count)
    }

    async fn reset_sequential_sells(&self, wallet: &str) -> Result<()> {
        let _: () = redis::cmd("DEL")
            .arg(self.sells_key(wallet))
            .query_async(&mut self.conn.clone())
            .await
            .context("Sequential-sell reset failed")?;
        Ok(())
    }

    async fn get_sequential_sells(&self, wallet: &str) -> Result<u64> {
        let count: Option<u64> = redis::cmd("GET")
            .arg(self.sells_key(wallet))
            .query_async(&mut self.conn.clone())
            .await
            .context("Sequential-sell read failed")?;
        Ok(count.unwrap_or(0))
    }

    async fn ping(&self) -> Result<()> {
        let pong: String = redis::cmd("PING")
            .query_async(&mut self.conn.clone())
            .await
            .context("Redis ping failed")?;
        if pong != "PONG" {
            anyhow::bail!("Unexpected ping reply: {}", pong);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_encoding_is_collision_safe_at_same_timestamp() {
        let a = encode_member(1_700_000_000, 125.5);
        let b = encode_member(1_700_000_000, 125.5);
        assert_ne!(a, b);
    }

    #[test]
    fn member_amount_is_last_colon_field() {
        let member = encode_member(1_700_000_000, 350.25);
        let amount = member.rsplit(':').next().unwrap();
        assert_eq!(amount.parse::<f64>().unwrap(), 350.25);
    }

    #[test]
    fn member_starts_with_timestamp() {
        let member = encode_member(1_700_000_042, 10.0);
        assert!(member.starts_with("1700000042:"));
    }

    #[test]
    fn integer_amounts_round_trip_through_display() {
        // Lua's tonumber must be able to parse whatever f64 Display emits.
        for amount in [0.0, 1.0, 300.0, 350.25, 0.0001, 12345678.9] {
            let member = encode_member(1, amount);
            let parsed: f64 = member.rsplit(':').next().unwrap().parse().unwrap();
            assert_eq!(parsed, amount);
        }
    }
}
