use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::{CacheConfig, RpcConfig};
use crate::error::{AppError, AppResult};
use crate::types::{lamports_to_sol, scale_raw_amount, SOL_MINT};

/// Current market view of one token, as the price feed reports it.
#[derive(Debug, Clone, Default)]
pub struct TokenInfo {
    pub symbol: String,
    pub icon: String,
    pub price_usd: Decimal,
    pub price_native: Decimal,
    pub market_cap: Decimal,
}

/// Resolves a token mint to its current market data.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// `None` when the token has no known market. Callers treat that as
    /// "price unavailable" and degrade, never fail.
    async fn token_info(&self, mint: &str) -> Option<TokenInfo>;

    /// USD price of the quote asset. Without it no trade can be valued,
    /// so unavailability is an error rather than a degraded zero.
    async fn native_price_usd(&self) -> AppResult<Decimal>;
}

/// Chain-level lookups: native balance and token supply.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    async fn sol_balance(&self, wallet: &str) -> AppResult<Decimal>;

    /// Circulating supply in whole tokens, zero when unavailable.
    async fn token_supply(&self, mint: &str) -> Decimal;
}

// ============================================================================
// DexScreener price feed
// ============================================================================

const DEXSCREENER_BASE: &str = "https://api.dexscreener.com";

#[derive(Debug, Deserialize)]
struct TokenPairsResponse {
    pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DexPair {
    url: Option<String>,
    base_token: BaseToken,
    price_native: Option<String>,
    price_usd: Option<String>,
    market_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BaseToken {
    symbol: Option<String>,
}

#[derive(Clone)]
pub struct DexScreenerOracle {
    client: Client,
    cache: Cache<String, Option<TokenInfo>>,
    request_timeout: Duration,
}

impl DexScreenerOracle {
    pub fn new(cache_config: &CacheConfig, request_timeout: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(cache_config.max_capacity)
            .time_to_live(Duration::from_secs(cache_config.ttl_seconds))
            .build();

        Self {
            client: Client::new(),
            cache,
            request_timeout,
        }
    }

    async fn fetch_token(&self, mint: &str) -> Option<TokenInfo> {
        let url = format!("{}/latest/dex/tokens/{}", DEXSCREENER_BASE, mint);

        let response = match self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(mint = %mint, error = %e, "DexScreener request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(mint = %mint, status = %response.status(), "DexScreener returned error status");
            return None;
        }

        let body: TokenPairsResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(mint = %mint, error = %e, "Failed to parse DexScreener response");
                return None;
            }
        };

        let pair = body.pairs?.into_iter().next()?;
        Some(TokenInfo {
            symbol: pair.base_token.symbol.unwrap_or_default(),
            icon: pair.url.unwrap_or_default(),
            price_usd: pair
                .price_usd
                .and_then(|p| p.parse::<Decimal>().ok())
                .unwrap_or_default(),
            price_native: pair
                .price_native
                .and_then(|p| p.parse::<Decimal>().ok())
                .unwrap_or_default(),
            market_cap: pair
                .market_cap
                .and_then(|m| Decimal::try_from(m).ok())
                .unwrap_or_default(),
        })
    }
}

#[async_trait]
impl PriceOracle for DexScreenerOracle {
    async fn token_info(&self, mint: &str) -> Option<TokenInfo> {
        self.cache
            .get_with(mint.to_string(), self.fetch_token(mint))
            .await
    }

    async fn native_price_usd(&self) -> AppResult<Decimal> {
        let info = self
            .token_info(SOL_MINT)
            .await
            .ok_or_else(|| AppError::Oracle("SOL price unavailable".to_string()))?;
        if info.price_usd <= Decimal::ZERO {
            return Err(AppError::Oracle("SOL price unavailable".to_string()));
        }
        Ok(info.price_usd)
    }
}

// ============================================================================
// Solana JSON-RPC client
// ============================================================================

#[derive(Clone)]
pub struct SolanaRpc {
    client: Client,
    urls: Vec<String>,
    supply_cache: Cache<String, Decimal>,
    request_timeout: Duration,
}

impl SolanaRpc {
    pub fn new(config: &RpcConfig, cache_config: &CacheConfig, request_timeout: Duration) -> Self {
        let mut urls = vec![config.url.clone()];
        if let Some(backup) = &config.backup_url {
            urls.push(backup.clone());
        }

        let supply_cache = Cache::builder()
            .max_capacity(cache_config.max_capacity)
            .time_to_live(Duration::from_secs(cache_config.ttl_seconds.max(300)))
            .build();

        Self {
            client: Client::new(),
            urls,
            supply_cache,
            request_timeout,
        }
    }

    /// Try each configured endpoint in order; first healthy answer wins.
    async fn call(&self, method: &str, params: serde_json::Value) -> AppResult<serde_json::Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut last_error = String::new();
        for url in &self.urls {
            let response = match self
                .client
                .post(url)
                .timeout(self.request_timeout)
                .json(&payload)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(url = %url, method = %method, error = %e, "RPC request failed, trying next endpoint");
                    last_error = e.to_string();
                    continue;
                }
            };

            if !response.status().is_success() {
                tracing::warn!(url = %url, method = %method, status = %response.status(), "RPC error status, trying next endpoint");
                last_error = format!("status {}", response.status());
                continue;
            }

            match response.json::<serde_json::Value>().await {
                Ok(body) => {
                    if let Some(result) = body.get("result") {
                        return Ok(result.clone());
                    }
                    last_error = format!("malformed RPC response: {}", body);
                }
                Err(e) => last_error = e.to_string(),
            }
        }

        Err(AppError::Oracle(format!(
            "all RPC endpoints failed for {}: {}",
            method, last_error
        )))
    }

    async fn fetch_supply(&self, mint: &str) -> Decimal {
        match self
            .call("getTokenSupply", serde_json::json!([mint]))
            .await
        {
            Ok(result) => {
                let amount = result
                    .pointer("/value/amount")
                    .and_then(|v| v.as_str())
                    .unwrap_or("0");
                let decimals = result
                    .pointer("/value/decimals")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u8;
                scale_raw_amount(amount, decimals)
            }
            Err(e) => {
                tracing::debug!(mint = %mint, error = %e, "Token supply unavailable, using zero");
                Decimal::ZERO
            }
        }
    }
}

#[async_trait]
impl BalanceOracle for SolanaRpc {
    async fn sol_balance(&self, wallet: &str) -> AppResult<Decimal> {
        let result = self.call("getBalance", serde_json::json!([wallet])).await?;
        let lamports = result
            .pointer("/value")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| AppError::Oracle("malformed getBalance response".to_string()))?;
        Ok(lamports_to_sol(lamports))
    }

    async fn token_supply(&self, mint: &str) -> Decimal {
        self.supply_cache
            .get_with(mint.to_string(), self.fetch_supply(mint))
            .await
    }
}
