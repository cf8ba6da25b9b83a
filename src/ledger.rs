use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::db::{LedgerEntry, Store};
use crate::error::AppResult;
use crate::types::Chain;

const CACHE_LIMIT: usize = 1024;

/// What a single sell realized against the running average buy price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SellOutcome {
    pub realized_profit: Decimal,
    pub realized_profit_percentage: Decimal,
    /// Share of the held position this sell closed, capped at 100.
    pub sell_percentage: Decimal,
}

impl LedgerEntry {
    /// Fold a buy into the position. Cost accumulates and the average
    /// buy price is re-derived from the running totals.
    pub fn apply_buy(&mut self, amount: Decimal, cost: Decimal) {
        self.total_amount += amount;
        self.total_cost += cost;
        if self.total_amount > Decimal::ZERO {
            self.avg_buy_price = self.total_cost / self.total_amount;
        }
    }

    /// Fold a sell into the position and report what it realized.
    ///
    /// A sell against an empty position (history older than the replay
    /// window) resets the entry and realizes nothing. The cost basis is
    /// only zeroed once the position is effectively closed; a partial
    /// sell keeps the full cost, so the average buy price of the
    /// remainder rises. The average is always `total_cost/total_amount`,
    /// re-derived from the running totals on every sell.
    pub fn apply_sell(&mut self, amount: Decimal, value: Decimal) -> SellOutcome {
        if self.total_amount <= Decimal::ZERO || amount <= Decimal::ZERO {
            *self = LedgerEntry::default();
            return SellOutcome::default();
        }
        self.avg_buy_price = self.total_cost / self.total_amount;

        let sell_percentage = (amount / self.total_amount * dec!(100)).min(dec!(100));
        let sell_price = value / amount;
        let realized_profit = (sell_price - self.avg_buy_price) * amount;
        let realized_profit_percentage = if self.avg_buy_price > Decimal::ZERO {
            ((sell_price / self.avg_buy_price - Decimal::ONE) * dec!(100)).max(dec!(-100))
        } else {
            Decimal::ZERO
        };

        let remaining = (self.total_amount - amount).max(Decimal::ZERO);
        self.total_amount = remaining;
        if remaining <= amount {
            self.total_cost = Decimal::ZERO;
        }
        self.avg_buy_price = if remaining > Decimal::ZERO {
            self.total_cost / remaining
        } else {
            Decimal::ZERO
        };

        SellOutcome {
            realized_profit,
            realized_profit_percentage,
            sell_percentage,
        }
    }
}

/// Store-backed view of a wallet's ledger for one replay pass.
///
/// Entries are committed per event: the caller loads, mutates, then commits,
/// so a failed write leaves the persisted position at the previous event's
/// state and the replay can abort cleanly.
pub struct CostBasisLedger {
    store: Arc<dyn Store>,
    wallet: String,
    chain: Chain,
    cache: HashMap<String, LedgerEntry>,
}

impl CostBasisLedger {
    pub fn new(store: Arc<dyn Store>, wallet: impl Into<String>, chain: Chain) -> Self {
        Self {
            store,
            wallet: wallet.into(),
            chain,
            cache: HashMap::new(),
        }
    }

    pub async fn load(&mut self, token: &str) -> AppResult<LedgerEntry> {
        if let Some(entry) = self.cache.get(token) {
            return Ok(entry.clone());
        }
        let entry = self
            .store
            .ledger_entry(&self.wallet, self.chain, token)
            .await?
            .unwrap_or_default();
        self.insert_cached(token, entry.clone());
        Ok(entry)
    }

    pub async fn commit(&mut self, token: &str, entry: LedgerEntry) -> AppResult<()> {
        self.store
            .upsert_ledger_entry(&self.wallet, self.chain, token, entry.clone())
            .await?;
        self.insert_cached(token, entry);
        Ok(())
    }

    fn insert_cached(&mut self, token: &str, entry: LedgerEntry) {
        if self.cache.len() >= CACHE_LIMIT && !self.cache.contains_key(token) {
            if let Some(evict) = self.cache.keys().next().cloned() {
                self.cache.remove(&evict);
            }
        }
        self.cache.insert(token.to_string(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_accumulates_cost_basis() {
        let mut entry = LedgerEntry::default();
        entry.apply_buy(dec!(100), dec!(100));
        entry.apply_buy(dec!(100), dec!(300));

        assert_eq!(entry.total_amount, dec!(200));
        assert_eq!(entry.total_cost, dec!(400));
        assert_eq!(entry.avg_buy_price, dec!(2));
    }

    #[test]
    fn partial_sell_keeps_cost_basis() {
        let mut entry = LedgerEntry::default();
        entry.apply_buy(dec!(100), dec!(100));

        let outcome = entry.apply_sell(dec!(40), dec!(60));

        assert_eq!(outcome.realized_profit, dec!(20));
        assert_eq!(outcome.realized_profit_percentage, dec!(50));
        assert_eq!(outcome.sell_percentage, dec!(40));
        assert_eq!(entry.total_amount, dec!(60));
        assert_eq!(entry.total_cost, dec!(100));
        // Full cost now spread over the remainder.
        assert_eq!(entry.avg_buy_price, dec!(100) / dec!(60));
    }

    #[test]
    fn second_partial_sell_realizes_against_running_average() {
        let mut entry = LedgerEntry::default();
        entry.apply_buy(dec!(120), dec!(120));

        let first = entry.apply_sell(dec!(40), dec!(80));
        assert_eq!(first.realized_profit, dec!(40));
        // 80 tokens left carrying the full $120 cost.
        assert_eq!(entry.avg_buy_price, dec!(1.5));

        let second = entry.apply_sell(dec!(30), dec!(60));
        assert_eq!(second.realized_profit, dec!(15));
        assert_eq!(second.realized_profit_percentage.round_dp(6), dec!(33.333333));
        assert_eq!(entry.total_amount, dec!(50));
        assert_eq!(entry.total_cost, dec!(120));
    }

    #[test]
    fn closing_sell_zeroes_cost() {
        let mut entry = LedgerEntry::default();
        entry.apply_buy(dec!(100), dec!(100));

        let outcome = entry.apply_sell(dec!(100), dec!(50));

        assert_eq!(outcome.realized_profit, dec!(-50));
        assert_eq!(outcome.realized_profit_percentage, dec!(-50));
        assert_eq!(outcome.sell_percentage, dec!(100));
        assert_eq!(entry.total_amount, Decimal::ZERO);
        assert_eq!(entry.total_cost, Decimal::ZERO);
    }

    #[test]
    fn oversell_caps_percentage_and_loss() {
        let mut entry = LedgerEntry::default();
        entry.apply_buy(dec!(10), dec!(100));

        // Selling more than held: the excess came from before the window.
        let outcome = entry.apply_sell(dec!(20), dec!(0));

        assert_eq!(outcome.sell_percentage, dec!(100));
        assert_eq!(outcome.realized_profit_percentage, dec!(-100));
        assert_eq!(entry.total_amount, Decimal::ZERO);
        assert_eq!(entry.total_cost, Decimal::ZERO);
    }

    #[test]
    fn sell_on_empty_position_is_a_noop() {
        let mut entry = LedgerEntry::default();
        let outcome = entry.apply_sell(dec!(5), dec!(10));

        assert_eq!(outcome, SellOutcome::default());
        assert_eq!(entry, LedgerEntry::default());
    }

    #[tokio::test]
    async fn ledger_round_trips_through_store() {
        let store = Arc::new(crate::db::MemoryStore::new());
        let mut ledger = CostBasisLedger::new(store.clone(), "wallet", Chain::Solana);

        let mut entry = ledger.load("mint").await.unwrap();
        entry.apply_buy(dec!(5), dec!(10));
        ledger.commit("mint", entry).await.unwrap();

        let stored = store
            .ledger_entry("wallet", Chain::Solana, "mint")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_amount, dec!(5));
        assert_eq!(stored.avg_buy_price, dec!(2));
    }
}
