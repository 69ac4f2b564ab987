use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Top-level configuration, loaded from `config.toml` at startup.
///
/// Required sections carry the external credentials (Helius, Telegram,
/// Pushover); tunable sections fall back to defaults when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub token: TokenConfig,
    pub helius: HeliusConfig,
    pub telegram: TelegramConfig,
    pub pushover: PushoverConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub prices: PriceConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub webserver: WebserverConfig,
}

/// The single token mint the pipeline watches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub mint: String,
    /// Display label used in notifications (e.g. "BONK").
    pub label: String,
    #[serde(default)]
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeliusConfig {
    pub api_key: String,
    /// Public URL Helius will POST transaction batches to.
    pub webhook_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Channel or group that receives rule alerts.
    pub channel_id: i64,
    /// User ids allowed to mutate the tracked-wallet list.
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    #[serde(default = "default_true")]
    pub commands_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushoverConfig {
    pub app_token: String,
    #[serde(default = "default_pushover_url")]
    pub api_url: String,
    #[serde(default = "default_pushover_sound")]
    pub sound: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub chat_threshold_usd: f64,
    pub single_threshold_usd: f64,
    pub cumulative_threshold_usd: f64,
    pub window_seconds: u64,
    pub five_sells_enabled: bool,
    pub five_sells_threshold_usd: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            chat_threshold_usd: 500.0,
            single_threshold_usd: 300.0,
            cumulative_threshold_usd: 300.0,
            window_seconds: 3600,
            five_sells_enabled: true,
            five_sells_threshold_usd: 300.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    pub api_url: String,
    pub cache_ttl_secs: u64,
    pub timeout_seconds: u64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.dexscreener.com/latest/dex/tokens".to_string(),
            cache_ttl_secs: 60,
            timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: u8,
    pub password: String,
    /// Key namespace, e.g. "mintwatch:".
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: String::new(),
            key_prefix: "mintwatch:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "mintwatch.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebserverConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebserverConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_pushover_url() -> String {
    "https://api.pushover.net/1/messages.json".to_string()
}

fn default_pushover_sound() -> String {
    "cashregister".to_string()
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Startup validation. Any failure here is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.token.mint.is_empty() {
            bail!("token.mint must be set");
        }
        if self.token.decimals > 18 {
            bail!("token.decimals must be 0-18, got {}", self.token.decimals);
        }
        if self.helius.api_key.is_empty() {
            bail!("helius.api_key must be set");
        }
        if self.telegram.bot_token.is_empty() {
            bail!("telegram.bot_token must be set");
        }
        if self.telegram.channel_id == 0 {
            bail!("telegram.channel_id must be set");
        }
        if self.pushover.app_token.is_empty() {
            bail!("pushover.app_token must be set");
        }
        if self.alerts.window_seconds == 0 {
            bail!("alerts.window_seconds must be positive");
        }
        for threshold in [
            self.alerts.chat_threshold_usd,
            self.alerts.single_threshold_usd,
            self.alerts.cumulative_threshold_usd,
            self.alerts.five_sells_threshold_usd,
        ] {
            if !threshold.is_finite() || threshold < 0.0 {
                bail!("alert thresholds must be non-negative finite numbers");
            }
        }
        if self.prices.cache_ttl_secs == 0 {
            bail!("prices.cache_ttl_secs must be positive");
        }
        Ok(())
    }
}
