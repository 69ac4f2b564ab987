//! Helius webhook provisioning.
//!
//! Thin client over the `/v0/webhooks` API, used by the admin endpoints
//! to manage which wallets the upstream provider watches. Nothing here
//! runs in the event pipeline.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::HeliusConfig;
use crate::logger::{self, LogTag};

const BASE_URL: &str = "https://api.helius.xyz/v0";
const REQUEST_TIMEOUT_SECS: u64 = 10;

pub struct HeliusClient {
    client: Client,
    api_key: String,
    webhook_url: String,
    base_url: String,
}

impl HeliusClient {
    pub fn new(config: &HeliusConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build Helius HTTP client")?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            webhook_url: config.webhook_url.clone(),
            base_url: BASE_URL.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}?api-key={}", self.base_url, path, self.api_key)
    }

    pub async fn list_webhooks(&self) -> Result<Value> {
        let response = self
            .client
            .get(self.url("/webhooks"))
            .send()
            .await
            .context("Helius list request failed")?;
        read_json(response).await
    }

    pub async fn get_webhook(&self, webhook_id: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.url(&format!("/webhooks/{}", webhook_id)))
            .send()
            .await
            .context("Helius get request failed")?;
        read_json(response).await
    }

    /// Register a new enhanced webhook watching the given wallets.
    pub async fn create_webhook(&self, addresses: &[String]) -> Result<Value> {
        let body = json!({
            "webhookURL": self.webhook_url,
            "transactionTypes": ["ANY"],
            "accountAddresses": addresses,
            "webhookType": "enhanced",
        });
        let response = self
            .client
            .post(self.url("/webhooks"))
            .json(&body)
            .send()
            .await
            .context("Helius create request failed")?;
        logger::info(
            LogTag::Helius,
            &format!("Created webhook watching {} wallets", addresses.len()),
        );
        read_json(response).await
    }

    /// Replace a webhook's watched address list.
    pub async fn edit_webhook(&self, webhook_id: &str, addresses: &[String]) -> Result<Value> {
        let body = json!({
            "webhookURL": self.webhook_url,
            "transactionTypes": ["ANY"],
            "accountAddresses": addresses,
            "webhookType": "enhanced",
        });
        let response = self
            .client
            .put(self.url(&format!("/webhooks/{}", webhook_id)))
            .json(&body)
            .send()
            .await
            .context("Helius edit request failed")?;
        read_json(response).await
    }

    /// Merge new wallets into a webhook's watch list.
    pub async fn add_wallets(&self, webhook_id: &str, wallets: &[String]) -> Result<Value> {
        let current = self.get_webhook(webhook_id).await?;
        let mut addresses = watched_addresses(&current);
        for wallet in wallets {
            if !addresses.iter().any(|a| a == wallet) {
                addresses.push(wallet.clone());
            }
        }
        self.edit_webhook(webhook_id, &addresses).await
    }

    /// Drop wallets from a webhook's watch list.
    pub async fn remove_wallets(&self, webhook_id: &str, wallets: &[String]) -> Result<Value> {
        let current = self.get_webhook(webhook_id).await?;
        let addresses: Vec<String> = watched_addresses(&current)
            .into_iter()
            .filter(|address| !wallets.iter().any(|w| w == address))
            .collect();
        self.edit_webhook(webhook_id, &addresses).await
    }

    pub async fn delete_webhook(&self, webhook_id: &str) -> Result<Value> {
        let response = self
            .client
            .delete(self.url(&format!("/webhooks/{}", webhook_id)))
            .send()
            .await
            .context("Helius delete request failed")?;
        logger::info(LogTag::Helius, &format!("Deleted webhook {}", webhook_id));
        read_json(response).await
    }
}

/// Pull the `accountAddresses` array out of a webhook object.
fn watched_addresses(webhook: &Value) -> Vec<String> {
    webhook["accountAddresses"]
        .as_array()
        .map(|addresses| {
            addresses
                .iter()
                .filter_map(|a| a.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .unwrap_or_else(|_| json!({"error": "non-JSON response"}));
    if !status.is_success() {
        anyhow::bail!("Helius returned {}: {}", status, body);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_watched_addresses() {
        let webhook = json!({
            "webhookID": "abc",
            "accountAddresses": ["W1", "W2"],
        });
        assert_eq!(watched_addresses(&webhook), vec!["W1", "W2"]);
        assert!(watched_addresses(&json!({})).is_empty());
    }

    #[test]
    fn api_key_rides_in_query_string() {
        let client = HeliusClient::new(&HeliusConfig {
            api_key: "secret".to_string(),
            webhook_url: "https://example.com/webhook".to_string(),
        })
        .unwrap();
        assert_eq!(
            client.url("/webhooks"),
            "https://api.helius.xyz/v0/webhooks?api-key=secret"
        );
    }
}
