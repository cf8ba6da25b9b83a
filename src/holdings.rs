use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::db::{HoldingRecord, Store, TransactionRecord};
use crate::error::AppResult;
use crate::oracle::PriceOracle;
use crate::types::{Chain, Direction};

#[derive(Default)]
struct PositionAgg {
    buy_amount: Decimal,
    sell_amount: Decimal,
    cost: Decimal,
    realized_profit: Decimal,
    entry_market_cap_sum: Decimal,
    buy_count: u32,
    token_name: String,
    token_icon: String,
    last_transaction_time: i64,
}

/// Project the wallet's open positions from its trade history, valued at
/// current prices. Tokens that were fully exited do not appear.
pub async fn project_holdings(
    wallet: &str,
    chain: Chain,
    records: &[TransactionRecord],
    prices: &dyn PriceOracle,
) -> Vec<HoldingRecord> {
    let mut positions: HashMap<&str, PositionAgg> = HashMap::new();

    for record in records {
        let agg = positions.entry(record.token_address.as_str()).or_default();
        match record.transaction_type {
            Direction::Buy => {
                agg.buy_amount += record.amount;
                agg.cost += record.value;
                agg.entry_market_cap_sum += record.market_cap;
                agg.buy_count += 1;
            }
            Direction::Sell => {
                agg.sell_amount += record.amount;
                agg.realized_profit += record.realized_profit;
            }
        }
        if record.transaction_time >= agg.last_transaction_time {
            agg.last_transaction_time = record.transaction_time;
            agg.token_name = record.token_name.clone();
            agg.token_icon = record.token_icon.clone();
        }
    }

    let mut holdings = Vec::new();
    for (mint, agg) in positions {
        let remaining = agg.buy_amount - agg.sell_amount;
        if remaining <= Decimal::ZERO {
            continue;
        }

        let avg_price = if agg.buy_amount > Decimal::ZERO {
            agg.cost / agg.buy_amount
        } else {
            Decimal::ZERO
        };

        let info = prices.token_info(mint).await.unwrap_or_default();
        let unrealized_profit = remaining * info.price_usd;
        let pnl_percentage = if avg_price > Decimal::ZERO && info.price_usd > Decimal::ZERO {
            (info.price_usd - avg_price) / avg_price * dec!(100)
        } else {
            Decimal::ZERO
        };
        let entry_market_cap = if agg.buy_count > 0 {
            (agg.entry_market_cap_sum / Decimal::from(agg.buy_count)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        holdings.push(HoldingRecord {
            wallet_address: wallet.to_string(),
            token_address: mint.to_string(),
            token_name: agg.token_name.clone(),
            token_icon: agg.token_icon.clone(),
            chain,
            buy_amount: agg.buy_amount,
            sell_amount: agg.sell_amount,
            amount: remaining,
            value: remaining * info.price_native,
            value_usd: remaining * info.price_usd,
            cost: agg.cost,
            realized_profit: agg.realized_profit,
            unrealized_profit,
            pnl: agg.realized_profit + unrealized_profit,
            pnl_percentage,
            avg_price,
            market_cap: entry_market_cap,
            last_transaction_time: agg.last_transaction_time,
            updated_at: Utc::now(),
        });
    }

    holdings.sort_by(|a, b| a.token_address.cmp(&b.token_address));
    holdings
}

/// Bring the stored holdings in line with the new projection: stale tokens
/// are deleted, the rest upserted. An empty projection clears the wallet.
pub async fn reconcile_holdings(
    store: &dyn Store,
    wallet: &str,
    chain: Chain,
    projected: Vec<HoldingRecord>,
) -> AppResult<()> {
    let existing = store.holdings(wallet, chain).await?;

    if projected.is_empty() {
        let all: Vec<String> = existing.into_iter().map(|h| h.token_address).collect();
        if !all.is_empty() {
            store.delete_holdings(wallet, chain, &all).await?;
        }
        return Ok(());
    }

    let kept: HashSet<&str> = projected.iter().map(|h| h.token_address.as_str()).collect();
    let stale: Vec<String> = existing
        .into_iter()
        .map(|h| h.token_address)
        .filter(|t| !kept.contains(t.as_str()))
        .collect();

    if !stale.is_empty() {
        tracing::debug!(wallet = %wallet, stale = stale.len(), "Removing exited holdings");
        store.delete_holdings(wallet, chain, &stale).await?;
    }
    store.upsert_holdings(projected).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::AppResult;
    use crate::oracle::TokenInfo;
    use async_trait::async_trait;
    use std::collections::HashMap as StdHashMap;

    struct FixturePrices(StdHashMap<String, TokenInfo>);

    #[async_trait]
    impl PriceOracle for FixturePrices {
        async fn token_info(&self, mint: &str) -> Option<TokenInfo> {
            self.0.get(mint).cloned()
        }

        async fn native_price_usd(&self) -> AppResult<Decimal> {
            Ok(dec!(150))
        }
    }

    fn record(
        token: &str,
        direction: Direction,
        amount: Decimal,
        value: Decimal,
        profit: Decimal,
        time: i64,
    ) -> TransactionRecord {
        TransactionRecord {
            wallet_address: "wallet".to_string(),
            signature: format!("{}-{}-{}", token, direction, time),
            chain: Chain::Solana,
            token_address: token.to_string(),
            token_name: token.to_uppercase(),
            token_icon: String::new(),
            price: Decimal::ZERO,
            amount,
            market_cap: dec!(1000000),
            value,
            holding_percentage: Decimal::ZERO,
            realized_profit: profit,
            realized_profit_percentage: Decimal::ZERO,
            transaction_type: direction,
            transaction_time: time,
            inserted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn exited_positions_are_excluded() {
        let records = vec![
            record("tokA", Direction::Buy, dec!(100), dec!(100), dec!(0), 10),
            record("tokA", Direction::Sell, dec!(100), dec!(150), dec!(50), 20),
            record("tokB", Direction::Buy, dec!(10), dec!(50), dec!(0), 30),
        ];
        let mut prices = StdHashMap::new();
        prices.insert(
            "tokB".to_string(),
            TokenInfo {
                price_usd: dec!(8),
                price_native: dec!(0.05),
                ..TokenInfo::default()
            },
        );

        let holdings =
            project_holdings("wallet", Chain::Solana, &records, &FixturePrices(prices)).await;

        assert_eq!(holdings.len(), 1);
        let b = &holdings[0];
        assert_eq!(b.token_address, "tokB");
        assert_eq!(b.amount, dec!(10));
        assert_eq!(b.avg_price, dec!(5));
        assert_eq!(b.unrealized_profit, dec!(80));
        assert_eq!(b.pnl, dec!(80));
        assert_eq!(b.pnl_percentage, dec!(60));
        assert_eq!(b.value, dec!(0.5));
        assert_eq!(b.value_usd, dec!(80));
    }

    #[tokio::test]
    async fn reconcile_deletes_stale_and_upserts_new() {
        let store = MemoryStore::new();
        let prices = FixturePrices(StdHashMap::new());

        let first = vec![
            record("tokA", Direction::Buy, dec!(10), dec!(10), dec!(0), 10),
            record("tokB", Direction::Buy, dec!(10), dec!(10), dec!(0), 10),
        ];
        let projected = project_holdings("wallet", Chain::Solana, &first, &prices).await;
        reconcile_holdings(&store, "wallet", Chain::Solana, projected)
            .await
            .unwrap();
        assert_eq!(store.holdings("wallet", Chain::Solana).await.unwrap().len(), 2);

        // tokB fully exited since the last pass.
        let second = vec![
            record("tokA", Direction::Buy, dec!(10), dec!(10), dec!(0), 10),
            record("tokB", Direction::Buy, dec!(10), dec!(10), dec!(0), 10),
            record("tokB", Direction::Sell, dec!(10), dec!(12), dec!(2), 20),
        ];
        let projected = project_holdings("wallet", Chain::Solana, &second, &prices).await;
        reconcile_holdings(&store, "wallet", Chain::Solana, projected)
            .await
            .unwrap();

        let remaining = store.holdings("wallet", Chain::Solana).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].token_address, "tokA");
    }

    #[tokio::test]
    async fn empty_projection_clears_wallet() {
        let store = MemoryStore::new();
        let prices = FixturePrices(StdHashMap::new());

        let first = vec![record("tokA", Direction::Buy, dec!(10), dec!(10), dec!(0), 10)];
        let projected = project_holdings("wallet", Chain::Solana, &first, &prices).await;
        reconcile_holdings(&store, "wallet", Chain::Solana, projected)
            .await
            .unwrap();

        reconcile_holdings(&store, "wallet", Chain::Solana, Vec::new())
            .await
            .unwrap();
        assert!(store.holdings("wallet", Chain::Solana).await.unwrap().is_empty());
    }
}
