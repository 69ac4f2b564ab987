//! USD pricing via DexScreener with a TTL cache in front.
//!
//! One oracle instance is shared by the pipeline and the webserver. Cache
//! hit rate is the main performance lever; misses cost one HTTPS round
//! trip with a hard 5 s timeout. Failed fetches are never cached.

use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::PriceConfig;
use crate::logger::{self, LogTag};

#[derive(Debug, Clone, Copy)]
struct PriceQuote {
    price_usd: f64,
    fetched_at: Instant,
}

impl PriceQuote {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

pub struct PriceOracle {
    client: Client,
    api_url: String,
    ttl: Duration,
    cache: RwLock<HashMap<String, PriceQuote>>,
}

impl PriceOracle {
    pub fn new(config: &PriceConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            ttl: Duration::from_secs(config.cache_ttl_secs),
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// USD value of a raw token amount, or `None` when no quote is
    /// available. Monotonic in `raw_amount` for a fixed cache state.
    pub async fn usd_value(&self, mint: &str, raw_amount: u64, decimals: u8) -> Option<f64> {
        let price = self.price_usd(mint).await?;
        Some(raw_amount as f64 / 10f64.powi(decimals as i32) * price)
    }

    /// Current USD price for a mint: cache first, DexScreener on miss.
    pub async fn price_usd(&self, mint: &str) -> Option<f64> {
        if let Some(quote) = self.cache.read().await.get(mint) {
            if quote.is_fresh(self.ttl) {
                logger::debug(
                    LogTag::Prices,
                    &format!("Cache hit for {}: ${}", mint, quote.price_usd),
                );
                return Some(quote.price_usd);
            }
        }

        // Concurrent misses may fetch in parallel; last writer wins.
        let price = self.fetch_price(mint).await?;
        self.cache.write().await.insert(
            mint.to_string(),
            PriceQuote {
                price_usd: price,
                fetched_at: Instant::now(),
            },
        );
        Some(price)
    }

    async fn fetch_price(&self, mint: &str) -> Option<f64> {
        let url = format!("{}/{}", self.api_url, mint);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                logger::warning(
                    LogTag::Prices,
                    &format!("DexScreener request for {} failed: {}", mint, e),
                );
                return None;
            }
        };

        let json = match response.json::<Value>().await {
            Ok(json) => json,
            Err(e) => {
                logger::warning(
                    LogTag::Prices,
                    &format!("DexScreener response for {} is not JSON: {}", mint, e),
                );
                return None;
            }
        };

        match select_best_price(&json) {
            Some(price) => {
                logger::debug(LogTag::Prices, &format!("Fetched {}: ${}", mint, price));
                Some(price)
            }
            None => {
                logger::warning(
                    LogTag::Prices,
                    &format!("No usable DexScreener pair for {}", mint),
                );
                None
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn seed_cache(&self, mint: &str, price_usd: f64) {
        self.cache.write().await.insert(
            mint.to_string(),
            PriceQuote {
                price_usd,
                fetched_at: Instant::now(),
            },
        );
    }
}

/// Pick the pair with the greatest USD liquidity whose `priceUsd` parses
/// as a positive finite number.
fn select_best_price(json: &Value) -> Option<f64> {
    let pairs = json["pairs"].as_array()?;

    let mut best: Option<(f64, f64)> = None; // (liquidity, price)
    for pair in pairs {
        let price = match parse_price_usd(&pair["priceUsd"]) {
            Some(price) => price,
            None => continue,
        };
        let liquidity = pair["liquidity"]["usd"].as_f64().unwrap_or(0.0);
        if best.map(|(l, _)| liquidity > l).unwrap_or(true) {
            best = Some((liquidity, price));
        }
    }
    best.map(|(_, price)| price)
}

/// DexScreener serializes `priceUsd` as a string; tolerate numbers too.
fn parse_price_usd(value: &Value) -> Option<f64> {
    let price = match value {
        Value::String(s) => s.parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> PriceOracle {
        PriceOracle::new(&PriceConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn cached_price_is_returned_without_fetching() {
        let oracle = oracle();
        oracle.seed_cache("MINT", 2.5).await;
        assert_eq!(oracle.price_usd("MINT").await, Some(2.5));
    }

    #[tokio::test]
    async fn usd_value_applies_decimals() {
        let oracle = oracle();
        oracle.seed_cache("MINT", 2.5).await;
        let value = oracle.usd_value("MINT", 1_000_000_000, 9).await.unwrap();
        assert!((value - 2.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn usd_value_is_monotonic_in_amount() {
        let oracle = oracle();
        oracle.seed_cache("MINT", 0.0375).await;
        let mut last = 0.0;
        for amount in [1u64, 10, 1_000, 50_000, 9_000_000] {
            let value = oracle.usd_value("MINT", amount, 6).await.unwrap();
            assert!(value >= last);
            last = value;
        }
    }

    #[test]
    fn quote_freshness_respects_ttl() {
        let quote = PriceQuote {
            price_usd: 1.0,
            fetched_at: Instant::now(),
        };
        assert!(quote.is_fresh(Duration::from_secs(60)));
        assert!(!quote.is_fresh(Duration::ZERO));
    }

    #[test]
    fn selects_pair_with_greatest_liquidity() {
        let json: Value = serde_json::json!({
            "pairs": [
                {"priceUsd": "1.10", "liquidity": {"usd": 5_000.0}},
                {"priceUsd": "1.25", "liquidity": {"usd": 90_000.0}},
                {"priceUsd": "1.05", "liquidity": {"usd": 30_000.0}},
            ]
        });
        assert_eq!(select_best_price(&json), Some(1.25));
    }

    #[test]
    fn skips_pairs_with_unparseable_or_nonpositive_price() {
        let json: Value = serde_json::json!({
            "pairs": [
                {"priceUsd": "not-a-number", "liquidity": {"usd": 99_999.0}},
                {"priceUsd": "0", "liquidity": {"usd": 88_888.0}},
                {"priceUsd": "-3.0", "liquidity": {"usd": 77_777.0}},
                {"priceUsd": "0.5", "liquidity": {"usd": 10.0}},
            ]
        });
        assert_eq!(select_best_price(&json), Some(0.5));
    }

    #[test]
    fn no_pairs_means_no_price() {
        assert_eq!(select_best_price(&serde_json::json!({"pairs": []})), None);
        assert_eq!(select_best_price(&serde_json::json!({})), None);
        assert_eq!(
            select_best_price(&serde_json::json!({"pairs": null})),
            None
        );
    }

    #[test]
    fn numeric_price_usd_is_tolerated() {
        let json: Value = serde_json::json!({
            "pairs": [{"priceUsd": 0.042, "liquidity": {"usd": 1.0}}]
        });
        assert_eq!(select_best_price(&json), Some(0.042));
    }
}
