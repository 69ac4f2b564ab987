//! Canonical transfer events and the webhook payload they are parsed from.

pub mod parser;

use serde::{Deserialize, Serialize};

/// Trade direction relative to the fee payer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected buy or sell of the target token, immutable once built.
#[derive(Debug, Clone)]
pub struct TransferEvent {
    pub wallet: String,
    pub mint: String,
    /// Raw on-chain amount, not decimal-adjusted.
    pub amount: u64,
    pub decimals: u8,
    pub signature: String,
    pub timestamp: i64,
    pub direction: Direction,
    /// Resolved by the price oracle; `None` when the quote failed.
    pub usd_value: Option<f64>,
}

impl TransferEvent {
    /// Decimal-adjusted token amount for display.
    pub fn ui_amount(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// One raw enhanced-transaction object as POSTed by Helius.
///
/// `signature` and `timestamp` are the only required fields; everything
/// else defaults so a sparse payload still deserializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub signature: Option<String>,
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub fee_payer: String,
    #[serde(default)]
    pub token_transfers: Vec<TokenTransfer>,
}

impl WebhookPayload {
    /// A payload enters the pipeline only with both identity fields present.
    pub fn is_well_formed(&self) -> bool {
        self.signature.as_deref().map(|s| !s.is_empty()).unwrap_or(false)
            && self.timestamp.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    #[serde(default)]
    pub from_user_account: String,
    #[serde(default)]
    pub to_user_account: String,
    #[serde(default)]
    pub mint: String,
    #[serde(default)]
    pub token_amount: u64,
    /// Helius includes this on most transfer records; absent means 0.
    pub decimals: Option<u8>,
}
