pub mod models;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::AppResult;
use crate::types::Chain;

pub use models::{HoldingRecord, LedgerEntry, TransactionRecord, WalletSummary};

/// Persistence boundary for the pipeline. Everything the analyzer writes or
/// reads back goes through this trait so tests can swap in a memory store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace by (wallet, signature). Replaying the same window
    /// twice must not duplicate rows.
    async fn upsert_transaction(&self, record: TransactionRecord) -> AppResult<()>;

    /// Transactions for a wallet within the last `days`, oldest first.
    async fn transactions_for_wallet(
        &self,
        wallet: &str,
        chain: Chain,
        days: i64,
    ) -> AppResult<Vec<TransactionRecord>>;

    async fn ledger_entry(
        &self,
        wallet: &str,
        chain: Chain,
        token: &str,
    ) -> AppResult<Option<LedgerEntry>>;

    async fn upsert_ledger_entry(
        &self,
        wallet: &str,
        chain: Chain,
        token: &str,
        entry: LedgerEntry,
    ) -> AppResult<()>;

    /// Drop all ledger positions for a wallet before a fresh replay.
    async fn reset_ledger(&self, wallet: &str, chain: Chain) -> AppResult<()>;

    async fn upsert_wallet_summary(&self, summary: WalletSummary) -> AppResult<()>;

    async fn wallet_summary(&self, wallet: &str, chain: Chain)
        -> AppResult<Option<WalletSummary>>;

    async fn set_wallet_active(&self, wallet: &str, chain: Chain, active: bool) -> AppResult<()>;

    async fn active_wallets(&self, chain: Chain) -> AppResult<Vec<String>>;

    async fn holdings(&self, wallet: &str, chain: Chain) -> AppResult<Vec<HoldingRecord>>;

    /// Insert or replace by (wallet, chain, token).
    async fn upsert_holdings(&self, records: Vec<HoldingRecord>) -> AppResult<()>;

    async fn delete_holdings(&self, wallet: &str, chain: Chain, tokens: &[String])
        -> AppResult<()>;
}

/// In-memory store. The default backend for single-process runs and the
/// fixture backend for tests.
#[derive(Default)]
pub struct MemoryStore {
    transactions: RwLock<HashMap<(String, String), TransactionRecord>>,
    ledger: RwLock<HashMap<(String, Chain, String), LedgerEntry>>,
    summaries: RwLock<HashMap<(String, Chain), WalletSummary>>,
    holdings: RwLock<HashMap<(String, Chain, String), HoldingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_transaction(&self, record: TransactionRecord) -> AppResult<()> {
        let key = (record.wallet_address.clone(), record.signature.clone());
        self.transactions.write().await.insert(key, record);
        Ok(())
    }

    async fn transactions_for_wallet(
        &self,
        wallet: &str,
        chain: Chain,
        days: i64,
    ) -> AppResult<Vec<TransactionRecord>> {
        let cutoff = Utc::now().timestamp() - days * 86_400;
        let map = self.transactions.read().await;
        let mut records: Vec<TransactionRecord> = map
            .values()
            .filter(|r| {
                r.wallet_address == wallet && r.chain == chain && r.transaction_time >= cutoff
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.transaction_time);
        Ok(records)
    }

    async fn ledger_entry(
        &self,
        wallet: &str,
        chain: Chain,
        token: &str,
    ) -> AppResult<Option<LedgerEntry>> {
        let key = (wallet.to_string(), chain, token.to_string());
        Ok(self.ledger.read().await.get(&key).cloned())
    }

    async fn upsert_ledger_entry(
        &self,
        wallet: &str,
        chain: Chain,
        token: &str,
        entry: LedgerEntry,
    ) -> AppResult<()> {
        let key = (wallet.to_string(), chain, token.to_string());
        self.ledger.write().await.insert(key, entry);
        Ok(())
    }

    async fn reset_ledger(&self, wallet: &str, chain: Chain) -> AppResult<()> {
        self.ledger
            .write()
            .await
            .retain(|(w, c, _), _| !(w == wallet && *c == chain));
        Ok(())
    }

    async fn upsert_wallet_summary(&self, summary: WalletSummary) -> AppResult<()> {
        let key = (summary.wallet_address.clone(), summary.chain);
        self.summaries.write().await.insert(key, summary);
        Ok(())
    }

    async fn wallet_summary(
        &self,
        wallet: &str,
        chain: Chain,
    ) -> AppResult<Option<WalletSummary>> {
        let key = (wallet.to_string(), chain);
        Ok(self.summaries.read().await.get(&key).cloned())
    }

    async fn set_wallet_active(&self, wallet: &str, chain: Chain, active: bool) -> AppResult<()> {
        let key = (wallet.to_string(), chain);
        if let Some(summary) = self.summaries.write().await.get_mut(&key) {
            summary.is_active = active;
            summary.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn active_wallets(&self, chain: Chain) -> AppResult<Vec<String>> {
        let map = self.summaries.read().await;
        let mut wallets: Vec<String> = map
            .values()
            .filter(|s| s.chain == chain && s.is_active)
            .map(|s| s.wallet_address.clone())
            .collect();
        wallets.sort();
        Ok(wallets)
    }

    async fn holdings(&self, wallet: &str, chain: Chain) -> AppResult<Vec<HoldingRecord>> {
        let map = self.holdings.read().await;
        let mut records: Vec<HoldingRecord> = map
            .values()
            .filter(|h| h.wallet_address == wallet && h.chain == chain)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.token_address.cmp(&b.token_address));
        Ok(records)
    }

    async fn upsert_holdings(&self, records: Vec<HoldingRecord>) -> AppResult<()> {
        let mut map = self.holdings.write().await;
        for record in records {
            let key = (
                record.wallet_address.clone(),
                record.chain,
                record.token_address.clone(),
            );
            map.insert(key, record);
        }
        Ok(())
    }

    async fn delete_holdings(
        &self,
        wallet: &str,
        chain: Chain,
        tokens: &[String],
    ) -> AppResult<()> {
        let mut map = self.holdings.write().await;
        for token in tokens {
            map.remove(&(wallet.to_string(), chain, token.clone()));
        }
        Ok(())
    }
}
