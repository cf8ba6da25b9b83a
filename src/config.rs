use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub helius: HeliusConfig,
    pub rpc: RpcConfig,
    pub analyzer: AnalyzerConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeliusConfig {
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default)]
    pub backup_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyzerConfig {
    /// How far back swap history is replayed.
    pub lookback_days: i64,
    /// Events per Helius page.
    pub page_size: u32,
    /// Hard ceiling on pages per wallet per cycle.
    pub max_pages: u32,
    /// Wallets analyzed concurrently per batch.
    pub batch_size: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub max_capacity: u64,
    pub ttl_seconds: u64,
}

impl AppConfig {
    pub fn load() -> AppResult<Self> {
        Self::build().map_err(|e| AppError::Config(e.to_string()))
    }

    fn build() -> Result<Self, config::ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("helius.api_key", "")?
            .set_default("rpc.url", "https://api.mainnet-beta.solana.com")?
            .set_default("analyzer.lookback_days", 30)?
            .set_default("analyzer.page_size", 100)?
            .set_default("analyzer.max_pages", 30)?
            .set_default("analyzer.batch_size", 5)?
            .set_default("analyzer.request_timeout_secs", 30)?
            .set_default("cache.max_capacity", 1000)?
            .set_default("cache.ttl_seconds", 60)?
            // Load from config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SMARTMONEY__HELIUS__API_KEY, etc.)
            // Double underscore as separator to handle nested keys with underscores
            .add_source(
                Environment::with_prefix("SMARTMONEY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_files_or_env() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.analyzer.lookback_days, 30);
        assert_eq!(config.analyzer.page_size, 100);
        assert_eq!(config.analyzer.max_pages, 30);
        assert_eq!(config.analyzer.batch_size, 5);
        assert_eq!(config.rpc.url, "https://api.mainnet-beta.solana.com");
        assert!(config.rpc.backup_url.is_none());
    }
}

