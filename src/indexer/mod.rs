pub mod helius;
pub mod normalizer;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::AnalyzerConfig;
use crate::db::{Store, TransactionRecord, WalletSummary};
use crate::error::{AppError, AppResult};
use crate::holdings;
use crate::ledger::CostBasisLedger;
use crate::metrics::{compute_window_stats, is_smart_wallet, WindowStats};
use crate::oracle::{BalanceOracle, PriceOracle};
use crate::types::{validate_solana_address, Chain, Direction, TimeWindow};

pub use helius::{EnhancedTransaction, EventFetcher, HeliusClient, SortedEvents};
pub use normalizer::{normalize, Swap};

/// Drives the full pipeline for one wallet: fetch, normalize, ledger
/// replay, window stats, classification, persistence.
pub struct WalletAnalyzer {
    fetcher: Arc<dyn EventFetcher>,
    prices: Arc<dyn PriceOracle>,
    chain_rpc: Arc<dyn BalanceOracle>,
    store: Arc<dyn Store>,
    settings: AnalyzerConfig,
}

impl WalletAnalyzer {
    pub fn new(
        fetcher: Arc<dyn EventFetcher>,
        prices: Arc<dyn PriceOracle>,
        chain_rpc: Arc<dyn BalanceOracle>,
        store: Arc<dyn Store>,
        settings: AnalyzerConfig,
    ) -> Self {
        Self {
            fetcher,
            prices,
            chain_rpc,
            store,
            settings,
        }
    }

    /// Full analysis cycle. Returns whether the wallet classified as smart
    /// money; the summary and holdings are only persisted when it did.
    pub async fn analyze_wallet(
        &self,
        wallet: &str,
        chain: Chain,
        lookback_days: i64,
    ) -> AppResult<bool> {
        if !validate_solana_address(wallet) {
            return Err(AppError::InvalidWallet(wallet.to_string()));
        }
        let started = Instant::now();

        let native_price = self.prices.native_price_usd().await?;
        let balance = match self.chain_rpc.sol_balance(wallet).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(wallet = %wallet, error = %e, "Balance lookup failed, assuming zero");
                Decimal::ZERO
            }
        };
        let balance_usd = balance * native_price;

        let events = self.fetcher.fetch_swaps(wallet, lookback_days).await?;
        if events.is_empty() {
            tracing::debug!(wallet = %wallet, "No swap history in window");
            return Ok(false);
        }

        let records = self
            .replay_events(wallet, chain, events, native_price, balance_usd)
            .await?;
        if records.is_empty() {
            return Ok(false);
        }

        let now = Utc::now().timestamp();
        let (stats_1d, stats_7d, stats_30d) = self.window_stats(&records, now, lookback_days).await;
        let smart = is_smart_wallet(&stats_7d, &stats_30d);

        if smart {
            let summary = self.build_summary(
                wallet, chain, balance, balance_usd, &records, stats_1d, stats_7d, stats_30d,
            );
            self.store.upsert_wallet_summary(summary).await?;

            let projected =
                holdings::project_holdings(wallet, chain, &records, self.prices.as_ref()).await;
            holdings::reconcile_holdings(self.store.as_ref(), wallet, chain, projected).await?;
        }

        tracing::info!(
            wallet = %wallet,
            transactions = records.len(),
            smart = smart,
            duration_ms = started.elapsed().as_millis() as u64,
            "Wallet analysis complete"
        );
        Ok(smart)
    }

    /// Re-evaluate a known wallet from its persisted transactions, without
    /// touching the event feed or the ledger. The snapshot is persisted
    /// unconditionally; the verdict only toggles the tracking flag.
    pub async fn refresh_wallet(&self, wallet: &str, chain: Chain) -> AppResult<bool> {
        let started = Instant::now();
        let records = self
            .store
            .transactions_for_wallet(wallet, chain, self.settings.lookback_days)
            .await?;

        let native_price = self.prices.native_price_usd().await?;
        let balance = match self.chain_rpc.sol_balance(wallet).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(wallet = %wallet, error = %e, "Balance lookup failed, assuming zero");
                Decimal::ZERO
            }
        };
        let balance_usd = balance * native_price;

        let now = Utc::now().timestamp();
        let (stats_1d, stats_7d, stats_30d) = self
            .window_stats(&records, now, self.settings.lookback_days)
            .await;
        let smart = is_smart_wallet(&stats_7d, &stats_30d);

        let summary = self.build_summary(
            wallet, chain, balance, balance_usd, &records, stats_1d, stats_7d, stats_30d,
        );
        self.store.upsert_wallet_summary(summary).await?;
        self.store.set_wallet_active(wallet, chain, smart).await?;

        tracing::info!(
            wallet = %wallet,
            smart = smart,
            duration_ms = started.elapsed().as_millis() as u64,
            "Wallet refresh complete"
        );
        Ok(smart)
    }

    /// Rebuild the wallet's holdings snapshot from its persisted history.
    pub async fn reconcile_holdings(&self, wallet: &str, chain: Chain) -> AppResult<()> {
        let records = self
            .store
            .transactions_for_wallet(wallet, chain, self.settings.lookback_days)
            .await?;
        let projected =
            holdings::project_holdings(wallet, chain, &records, self.prices.as_ref()).await;
        holdings::reconcile_holdings(self.store.as_ref(), wallet, chain, projected).await
    }

    /// Analyze wallets in bounded-concurrency chunks. One wallet's failure
    /// is logged and never aborts the rest. Returns how many classified as
    /// smart money.
    pub async fn run_batch(&self, wallets: &[String], chain: Chain) -> usize {
        let started = Instant::now();
        let mut smart_count = 0usize;

        for chunk in wallets.chunks(self.settings.batch_size.max(1)) {
            let results = futures::future::join_all(chunk.iter().map(|wallet| {
                self.analyze_wallet(wallet, chain, self.settings.lookback_days)
            }))
            .await;

            for (wallet, result) in chunk.iter().zip(results) {
                match result {
                    Ok(true) => smart_count += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(wallet = %wallet, error = %e, "Wallet analysis failed")
                    }
                }
            }
        }

        tracing::info!(
            wallets = wallets.len(),
            smart = smart_count,
            duration_ms = started.elapsed().as_millis() as u64,
            "Batch run complete"
        );
        smart_count
    }

    /// Replay the event stream through the cost-basis ledger, emitting one
    /// enriched TransactionRecord per tradeable swap. The record upsert and
    /// the ledger commit happen per event, in that order, so an aborted
    /// replay leaves both consistent up to the last processed event.
    async fn replay_events(
        &self,
        wallet: &str,
        chain: Chain,
        events: SortedEvents,
        native_price: Decimal,
        balance_usd: Decimal,
    ) -> AppResult<Vec<TransactionRecord>> {
        let started = Instant::now();
        self.store.reset_ledger(wallet, chain).await?;
        let mut ledger = CostBasisLedger::new(self.store.clone(), wallet, chain);
        let mut records = Vec::new();

        for event in events {
            // The feed is queried with type=SWAP, but don't trust it.
            if event.tx_type != "SWAP" {
                continue;
            }
            let Some(swap) = normalize(&event, wallet, native_price) else {
                continue;
            };

            let token = swap.token_address().to_string();
            let amount = swap.token_amount();
            let value = swap.quote_value;

            let mut entry = ledger.load(&token).await?;
            let (holding_percentage, outcome) = match swap.direction {
                Direction::Buy => {
                    entry.apply_buy(amount, value);
                    let denominator = value + balance_usd;
                    let pct = if denominator > Decimal::ZERO {
                        (value / denominator * dec!(100)).min(dec!(100))
                    } else {
                        Decimal::ZERO
                    };
                    (pct, Default::default())
                }
                Direction::Sell => {
                    let outcome = entry.apply_sell(amount, value);
                    (outcome.sell_percentage, outcome)
                }
            };

            let price = if amount > Decimal::ZERO {
                value / amount
            } else {
                Decimal::ZERO
            };
            let info = self.prices.token_info(&token).await.unwrap_or_default();
            let supply = self.chain_rpc.token_supply(&token).await;
            let market_cap = (price * supply).round_dp(2);

            let record = TransactionRecord {
                wallet_address: wallet.to_string(),
                signature: swap.signature.clone(),
                chain,
                token_address: token.clone(),
                token_name: info.symbol,
                token_icon: info.icon,
                price,
                amount,
                market_cap,
                value,
                holding_percentage,
                realized_profit: outcome.realized_profit,
                realized_profit_percentage: outcome.realized_profit_percentage,
                transaction_type: swap.direction,
                transaction_time: swap.timestamp,
                inserted_at: Utc::now(),
            };

            // A failed write drops this event and moves on; the ledger
            // cache still holds the previous committed state, so later
            // events replay against a consistent position.
            if let Err(e) = self.store.upsert_transaction(record.clone()).await {
                tracing::warn!(wallet = %wallet, signature = %record.signature, error = %e, "Transaction write failed, skipping event");
                continue;
            }
            if let Err(e) = ledger.commit(&token, entry).await {
                tracing::warn!(wallet = %wallet, signature = %record.signature, error = %e, "Ledger write failed, skipping event");
                continue;
            }
            records.push(record);
        }

        tracing::debug!(
            wallet = %wallet,
            records = records.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Ledger replay complete"
        );
        Ok(records)
    }

    async fn window_stats(
        &self,
        records: &[TransactionRecord],
        now: i64,
        lookback_days: i64,
    ) -> (WindowStats, WindowStats, WindowStats) {
        let prices = self.prices.as_ref();
        let day = compute_window_stats(records, TimeWindow::Day.to_days(), now, lookback_days, prices)
            .await;
        let week =
            compute_window_stats(records, TimeWindow::Week.to_days(), now, lookback_days, prices)
                .await;
        let month =
            compute_window_stats(records, TimeWindow::Month.to_days(), now, lookback_days, prices)
                .await;
        (day, week, month)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_summary(
        &self,
        wallet: &str,
        chain: Chain,
        balance: Decimal,
        balance_usd: Decimal,
        records: &[TransactionRecord],
        stats_1d: WindowStats,
        stats_7d: WindowStats,
        stats_30d: WindowStats,
    ) -> WalletSummary {
        let last_transaction_time = records.last().map(|r| r.transaction_time).unwrap_or(0);

        // Three most recently traded tokens, newest first.
        let mut token_list: Vec<String> = Vec::new();
        for record in records.iter().rev() {
            let name = if record.token_name.is_empty() {
                record.token_address.clone()
            } else {
                record.token_name.clone()
            };
            if !token_list.contains(&name) {
                token_list.push(name);
            }
            if token_list.len() == 3 {
                break;
            }
        }

        WalletSummary {
            wallet_address: wallet.to_string(),
            chain,
            balance,
            balance_usd,
            tag: String::new(),
            is_smart_wallet: is_smart_wallet(&stats_7d, &stats_30d),
            is_active: true,
            wallet_type: 0,
            asset_multiple: stats_30d.asset_multiple,
            token_list: token_list.join(","),
            stats_1d,
            stats_7d,
            stats_30d,
            last_transaction_time,
            updated_at: Utc::now(),
        }
    }
}
