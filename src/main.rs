use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use smartmoney::config::AppConfig;
use smartmoney::db::{MemoryStore, Store};
use smartmoney::indexer::{HeliusClient, WalletAnalyzer};
use smartmoney::oracle::{DexScreenerOracle, SolanaRpc};
use smartmoney::types::Chain;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartmoney=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let request_timeout = Duration::from_secs(config.analyzer.request_timeout_secs);

    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let prices = Arc::new(DexScreenerOracle::new(&config.cache, request_timeout));
    let chain_rpc = Arc::new(SolanaRpc::new(&config.rpc, &config.cache, request_timeout));
    let fetcher = Arc::new(HeliusClient::new(&config.helius, &config.analyzer));

    let analyzer = WalletAnalyzer::new(
        fetcher,
        prices,
        chain_rpc,
        store.clone(),
        config.analyzer.clone(),
    );

    let mut wallets: Vec<String> = std::env::args().skip(1).collect();
    if wallets.is_empty() {
        wallets = store.active_wallets(Chain::Solana).await?;
    }
    if wallets.is_empty() {
        tracing::warn!("No wallets to analyze; pass addresses as arguments");
        return Ok(());
    }

    let smart = analyzer.run_batch(&wallets, Chain::Solana).await;
    tracing::info!(total = wallets.len(), smart = smart, "Run finished");
    Ok(())
}
