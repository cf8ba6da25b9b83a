use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::config::{AnalyzerConfig, HeliusConfig};
use crate::error::{AppError, AppResult};

const HELIUS_API_BASE: &str = "https://api.helius.xyz/v0";

/// Enhanced transaction as returned by the Helius parse API. Only the
/// fields the normalizer consumes are kept.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedTransaction {
    pub signature: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(default)]
    pub fee: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub token_transfers: Option<Vec<TokenTransfer>>,
    #[serde(default)]
    pub account_data: Option<Vec<AccountData>>,
    #[serde(default)]
    pub events: Option<TransactionEvents>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    #[serde(default)]
    pub from_user_account: Option<String>,
    #[serde(default)]
    pub to_user_account: Option<String>,
    #[serde(default)]
    pub mint: String,
    #[serde(default)]
    pub token_amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub account: String,
    #[serde(default)]
    pub native_balance_change: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvents {
    #[serde(default)]
    pub swap: Option<SwapEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEvent {
    #[serde(default)]
    pub native_input: Option<NativeAmount>,
    #[serde(default)]
    pub native_output: Option<NativeAmount>,
    #[serde(default)]
    pub token_inputs: Vec<HeliusTokenAmount>,
    #[serde(default)]
    pub token_outputs: Vec<HeliusTokenAmount>,
}

/// Lamport amount, sent as a decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAmount {
    pub account: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeliusTokenAmount {
    #[serde(default)]
    pub user_account: String,
    #[serde(default)]
    pub mint: String,
    pub raw_token_amount: RawTokenAmount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenAmount {
    pub token_amount: String,
    pub decimals: u8,
}

/// Swap events for one wallet, oldest first. The ledger replay depends on
/// chronological order, so ordering lives in the type rather than at every
/// call site.
#[derive(Debug, Clone, Default)]
pub struct SortedEvents(Vec<EnhancedTransaction>);

impl SortedEvents {
    pub fn new(mut events: Vec<EnhancedTransaction>) -> Self {
        events.sort_by_key(|e| e.timestamp);
        Self(events)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnhancedTransaction> {
        self.0.iter()
    }
}

impl IntoIterator for SortedEvents {
    type Item = EnhancedTransaction;
    type IntoIter = std::vec::IntoIter<EnhancedTransaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Source of swap history for a wallet. Implemented by the Helius client in
/// production and by fixtures in tests.
#[async_trait]
pub trait EventFetcher: Send + Sync {
    async fn fetch_swaps(&self, wallet: &str, lookback_days: i64) -> AppResult<SortedEvents>;
}

#[derive(Clone)]
pub struct HeliusClient {
    client: Client,
    api_key: String,
    page_size: u32,
    max_pages: u32,
    request_timeout: Duration,
}

impl HeliusClient {
    pub fn new(helius: &HeliusConfig, analyzer: &AnalyzerConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: helius.api_key.clone(),
            page_size: analyzer.page_size,
            max_pages: analyzer.max_pages,
            request_timeout: Duration::from_secs(analyzer.request_timeout_secs),
        }
    }

    async fn fetch_page(
        &self,
        wallet: &str,
        before: Option<&str>,
    ) -> AppResult<Vec<EnhancedTransaction>> {
        let url = format!("{}/addresses/{}/transactions", HELIUS_API_BASE, wallet);

        let mut request = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .query(&[("api-key", self.api_key.as_str()), ("type", "SWAP")])
            .query(&[("limit", self.page_size)]);
        if let Some(signature) = before {
            request = request.query(&[("before", signature)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("Helius request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Fetch(format!(
                "Helius returned status {}",
                response.status()
            )));
        }

        response
            .json::<Vec<EnhancedTransaction>>()
            .await
            .map_err(|e| AppError::Fetch(format!("Failed to parse Helius response: {}", e)))
    }
}

#[async_trait]
impl EventFetcher for HeliusClient {
    /// Page backwards through history until the page limit or the lookback
    /// cutoff, whichever comes first. Events older than the cutoff are
    /// dropped even when they share a page with in-window ones.
    async fn fetch_swaps(&self, wallet: &str, lookback_days: i64) -> AppResult<SortedEvents> {
        let cutoff = Utc::now().timestamp() - lookback_days * 86_400;
        let started = Instant::now();

        let mut collected = Vec::new();
        let mut before: Option<String> = None;

        for _ in 0..self.max_pages {
            let page = self.fetch_page(wallet, before.as_deref()).await?;
            if page.is_empty() {
                break;
            }

            // Helius pages newest-first, so the page tail is the oldest.
            before = page.last().map(|tx| tx.signature.clone());
            let oldest = page.last().map(|tx| tx.timestamp).unwrap_or(0);

            collected.extend(page.into_iter().filter(|tx| tx.timestamp >= cutoff));

            if oldest < cutoff {
                break;
            }
        }

        tracing::debug!(
            wallet = %wallet,
            events = collected.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched swap history"
        );

        Ok(SortedEvents::new(collected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorted_events_orders_ascending() {
        let make = |sig: &str, ts: i64| EnhancedTransaction {
            signature: sig.to_string(),
            timestamp: ts,
            tx_type: "SWAP".to_string(),
            fee: 5000,
            description: None,
            token_transfers: None,
            account_data: None,
            events: None,
        };

        let sorted = SortedEvents::new(vec![make("c", 30), make("a", 10), make("b", 20)]);
        let timestamps: Vec<i64> = sorted.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20, 30]);
    }

    #[test]
    fn deserializes_swap_event_payload() {
        let value = json!({
            "signature": "sig1",
            "timestamp": 1700000000,
            "type": "SWAP",
            "fee": 5000,
            "description": "abc swapped 1.5 SOL for 1000 BONK",
            "events": {
                "swap": {
                    "nativeInput": {"account": "abc", "amount": "1500000000"},
                    "tokenOutputs": [{
                        "userAccount": "abc",
                        "mint": "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263",
                        "rawTokenAmount": {"tokenAmount": "100000000000", "decimals": 8}
                    }]
                }
            }
        });

        let tx: EnhancedTransaction = serde_json::from_value(value).unwrap();
        let swap = tx.events.unwrap().swap.unwrap();
        assert_eq!(swap.native_input.unwrap().amount, "1500000000");
        assert_eq!(swap.token_outputs[0].raw_token_amount.decimals, 8);
        assert!(swap.token_inputs.is_empty());
    }
}
