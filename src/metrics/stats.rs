use std::collections::HashMap;

use chrono::DateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::db::TransactionRecord;
use crate::oracle::PriceOracle;
use crate::types::{is_stablecoin, Direction};

const SECONDS_PER_DAY: i64 = 86_400;

/// Aggregated trading statistics for one wallet over one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub total_transaction_num: u32,
    pub total_buy: u32,
    pub total_sell: u32,
    pub total_cost: Decimal,
    pub total_profit: Decimal,
    /// Realized PnL: total_profit - total_cost.
    pub pnl: Decimal,
    pub pnl_percentage: Decimal,
    pub win_rate: Decimal,
    pub average_cost: Decimal,
    /// Mean (profit - cost) over winning tokens.
    pub avg_realized_profit: Decimal,
    pub total_unrealized_profit: Decimal,
    pub asset_multiple: Decimal,
    /// Per-day realized PnL, newest day first, 2 decimals, comma joined.
    pub daily_pnl_chart: String,
    pub distribution_gt500: u32,
    pub distribution_200to500: u32,
    pub distribution_0to200: u32,
    pub distribution_0to50: u32,
    pub distribution_lt50: u32,
    pub distribution_gt500_percentage: Decimal,
    pub distribution_200to500_percentage: Decimal,
    pub distribution_0to200_percentage: Decimal,
    pub distribution_0to50_percentage: Decimal,
    pub distribution_lt50_percentage: Decimal,
}

#[derive(Default)]
struct TokenAgg {
    buy_amount: Decimal,
    sell_amount: Decimal,
    cost: Decimal,
    profit: Decimal,
}

/// Fold a wallet's transaction history into window statistics.
///
/// The caller passes the full lookback set; windows shorter than the
/// lookback refilter by timestamp, the outermost window takes the set
/// as given. Stablecoin rows never count toward trading performance.
pub async fn compute_window_stats(
    records: &[TransactionRecord],
    window_days: i64,
    now: i64,
    lookback_days: i64,
    prices: &dyn PriceOracle,
) -> WindowStats {
    let cutoff = now - window_days * SECONDS_PER_DAY;
    let filtered: Vec<&TransactionRecord> = records
        .iter()
        .filter(|r| !is_stablecoin(&r.token_address))
        .filter(|r| window_days >= lookback_days || r.transaction_time >= cutoff)
        .collect();

    let mut stats = WindowStats {
        total_transaction_num: filtered.len() as u32,
        ..WindowStats::default()
    };

    let mut tokens: HashMap<&str, TokenAgg> = HashMap::new();
    let mut daily_pnl = vec![Decimal::ZERO; window_days.max(1) as usize];
    let today = DateTime::from_timestamp(now, 0).map(|t| t.date_naive());

    for record in &filtered {
        let agg = tokens.entry(record.token_address.as_str()).or_default();
        let day_contribution = match record.transaction_type {
            Direction::Buy => {
                stats.total_buy += 1;
                agg.buy_amount += record.amount;
                agg.cost += record.value;
                -record.value
            }
            Direction::Sell => {
                stats.total_sell += 1;
                agg.sell_amount += record.amount;
                agg.profit += record.realized_profit;
                record.realized_profit
            }
        };

        // Chart slots are UTC calendar days, not rolling 24h offsets; a
        // trade late yesterday belongs to yesterday however recent it is.
        let day = match (today, DateTime::from_timestamp(record.transaction_time, 0)) {
            (Some(today), Some(ts)) => (today - ts.date_naive()).num_days().max(0) as usize,
            _ => 0,
        };
        if let Some(slot) = daily_pnl.get_mut(day) {
            *slot += day_contribution;
        }
    }

    let mut winners = 0u32;
    let mut winners_pnl = Decimal::ZERO;
    let mut bucketed = 0u32;

    for (mint, agg) in &tokens {
        stats.total_cost += agg.cost;
        stats.total_profit += agg.profit;

        if agg.profit > agg.cost {
            winners += 1;
            winners_pnl += agg.profit - agg.cost;
        }

        // Open positions get marked to the current price; unpriced tokens
        // are left out rather than counted as a total loss.
        let remaining = agg.buy_amount - agg.sell_amount;
        if remaining > Decimal::ZERO && agg.buy_amount > Decimal::ZERO {
            if let Some(info) = prices.token_info(mint).await {
                if info.price_usd > Decimal::ZERO {
                    let avg_cost = agg.cost / agg.buy_amount;
                    stats.total_unrealized_profit += remaining * (info.price_usd - avg_cost);
                }
            }
        }

        if agg.cost > Decimal::ZERO {
            bucketed += 1;
            let pct = (agg.profit - agg.cost) / agg.cost * dec!(100);
            if pct > dec!(500) {
                stats.distribution_gt500 += 1;
            } else if pct >= dec!(200) {
                stats.distribution_200to500 += 1;
            } else if pct >= Decimal::ZERO {
                stats.distribution_0to200 += 1;
            } else if pct >= dec!(-50) {
                stats.distribution_0to50 += 1;
            } else {
                stats.distribution_lt50 += 1;
            }
        }
    }

    stats.pnl = stats.total_profit - stats.total_cost;
    if stats.total_cost > Decimal::ZERO {
        stats.pnl_percentage = (stats.pnl / stats.total_cost * dec!(100)).max(dec!(-100));
        stats.asset_multiple = (stats.pnl_percentage / dec!(100)).round_dp(2);
    }
    if !tokens.is_empty() {
        stats.win_rate = Decimal::from(winners) / Decimal::from(tokens.len() as u32) * dec!(100);
    }
    if stats.total_buy > 0 {
        stats.average_cost = stats.total_cost / Decimal::from(stats.total_buy);
    }
    if winners > 0 {
        stats.avg_realized_profit = winners_pnl / Decimal::from(winners);
    }
    if bucketed > 0 {
        let total = Decimal::from(bucketed);
        stats.distribution_gt500_percentage =
            (Decimal::from(stats.distribution_gt500) / total * dec!(100)).round_dp(2);
        stats.distribution_200to500_percentage =
            (Decimal::from(stats.distribution_200to500) / total * dec!(100)).round_dp(2);
        stats.distribution_0to200_percentage =
            (Decimal::from(stats.distribution_0to200) / total * dec!(100)).round_dp(2);
        stats.distribution_0to50_percentage =
            (Decimal::from(stats.distribution_0to50) / total * dec!(100)).round_dp(2);
        stats.distribution_lt50_percentage =
            (Decimal::from(stats.distribution_lt50) / total * dec!(100)).round_dp(2);
    }

    stats.daily_pnl_chart = daily_pnl
        .iter()
        .map(|v| format!("{:.2}", v))
        .collect::<Vec<_>>()
        .join(",");

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppResult;
    use crate::oracle::TokenInfo;
    use crate::types::Chain;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap as StdHashMap;

    struct FixturePrices(StdHashMap<String, Decimal>);

    #[async_trait]
    impl PriceOracle for FixturePrices {
        async fn token_info(&self, mint: &str) -> Option<TokenInfo> {
            self.0.get(mint).map(|p| TokenInfo {
                price_usd: *p,
                ..TokenInfo::default()
            })
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
            token_name: token.to_string(),
            token_icon: String::new(),
            price: if amount > Decimal::ZERO {
                value / amount
            } else {
                Decimal::ZERO
            },
            amount,
            market_cap: Decimal::ZERO,
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
    async fn aggregates_pnl_and_win_rate() {
        let now = Utc::now().timestamp();
        // Token A: closed for a profit. Token B: closed at a loss.
        let records = vec![
            record("tokA", Direction::Buy, dec!(100), dec!(100), dec!(0), now - 3600),
            record("tokA", Direction::Sell, dec!(100), dec!(300), dec!(200), now - 1800),
            record("tokB", Direction::Buy, dec!(50), dec!(200), dec!(0), now - 3600),
            record("tokB", Direction::Sell, dec!(50), dec!(100), dec!(-100), now - 1800),
        ];
        let prices = FixturePrices(StdHashMap::new());

        let stats = compute_window_stats(&records, 30, now, 30, &prices).await;

        assert_eq!(stats.total_transaction_num, 4);
        assert_eq!(stats.total_buy, 2);
        assert_eq!(stats.total_sell, 2);
        assert_eq!(stats.total_cost, dec!(300));
        assert_eq!(stats.total_profit, dec!(100));
        assert_eq!(stats.pnl, dec!(-200));
        assert_eq!(stats.win_rate, dec!(50));
        // tokA realized +100 over cost, the only winner.
        assert_eq!(stats.avg_realized_profit, dec!(100));
    }

    #[tokio::test]
    async fn distribution_buckets_partition_tokens() {
        let now = Utc::now().timestamp();
        // Per-token (profit - cost) / cost: +600%, +250%, +50%, -25%, -80%.
        let records = vec![
            record("t1", Direction::Buy, dec!(1), dec!(10), dec!(0), now - 100),
            record("t1", Direction::Sell, dec!(1), dec!(70), dec!(70), now - 90),
            record("t2", Direction::Buy, dec!(1), dec!(10), dec!(0), now - 100),
            record("t2", Direction::Sell, dec!(1), dec!(35), dec!(35), now - 90),
            record("t3", Direction::Buy, dec!(1), dec!(10), dec!(0), now - 100),
            record("t3", Direction::Sell, dec!(1), dec!(15), dec!(15), now - 90),
            record("t4", Direction::Buy, dec!(1), dec!(10), dec!(0), now - 100),
            record("t4", Direction::Sell, dec!(1), dec!(7.5), dec!(7.5), now - 90),
            record("t5", Direction::Buy, dec!(1), dec!(10), dec!(0), now - 100),
            record("t5", Direction::Sell, dec!(1), dec!(2), dec!(2), now - 90),
        ];
        let prices = FixturePrices(StdHashMap::new());

        let stats = compute_window_stats(&records, 30, now, 30, &prices).await;

        assert_eq!(stats.distribution_gt500, 1);
        assert_eq!(stats.distribution_200to500, 1);
        assert_eq!(stats.distribution_0to200, 1);
        assert_eq!(stats.distribution_0to50, 1);
        assert_eq!(stats.distribution_lt50, 1);
        let total = stats.distribution_gt500
            + stats.distribution_200to500
            + stats.distribution_0to200
            + stats.distribution_0to50
            + stats.distribution_lt50;
        assert_eq!(total, 5);
        assert_eq!(stats.distribution_gt500_percentage, dec!(20));
    }

    #[tokio::test]
    async fn shorter_window_refilters_by_timestamp() {
        let now = Utc::now().timestamp();
        let records = vec![
            record("tokA", Direction::Buy, dec!(10), dec!(10), dec!(0), now - 10 * 86_400),
            record("tokA", Direction::Sell, dec!(10), dec!(30), dec!(20), now - 3600),
        ];
        let prices = FixturePrices(StdHashMap::new());

        let week = compute_window_stats(&records, 7, now, 30, &prices).await;
        assert_eq!(week.total_transaction_num, 1);
        assert_eq!(week.total_cost, Decimal::ZERO);
        assert_eq!(week.total_profit, dec!(20));

        let month = compute_window_stats(&records, 30, now, 30, &prices).await;
        assert_eq!(month.total_transaction_num, 2);
    }

    #[tokio::test]
    async fn open_position_is_marked_to_price() {
        let now = Utc::now().timestamp();
        let records = vec![record(
            "tokA",
            Direction::Buy,
            dec!(100),
            dec!(100),
            dec!(0),
            now - 3600,
        )];
        let mut prices = StdHashMap::new();
        prices.insert("tokA".to_string(), dec!(3));

        let stats = compute_window_stats(&records, 30, now, 30, &FixturePrices(prices)).await;

        // 100 held at avg cost 1, now worth 3.
        assert_eq!(stats.total_unrealized_profit, dec!(200));
    }

    #[tokio::test]
    async fn daily_chart_is_newest_first() {
        // 2023-11-14 22:13:20 UTC.
        let now = 1_700_000_000;
        let records = vec![
            record("tokA", Direction::Sell, dec!(1), dec!(5), dec!(5), now - 3600),
            record("tokA", Direction::Sell, dec!(1), dec!(3), dec!(3), now - 86_400 - 3600),
        ];
        let prices = FixturePrices(StdHashMap::new());

        let stats = compute_window_stats(&records, 7, now, 30, &prices).await;
        let values: Vec<&str> = stats.daily_pnl_chart.split(',').collect();

        assert_eq!(values.len(), 7);
        assert_eq!(values[0], "5.00");
        assert_eq!(values[1], "3.00");
    }

    #[tokio::test]
    async fn daily_chart_buckets_by_calendar_date() {
        // 2023-11-15 01:00:00 UTC; two hours earlier is still Nov 14.
        let now = 1_700_010_000;
        let records = vec![record(
            "tokA",
            Direction::Sell,
            dec!(1),
            dec!(7),
            dec!(7),
            now - 7200,
        )];
        let prices = FixturePrices(StdHashMap::new());

        let stats = compute_window_stats(&records, 7, now, 30, &prices).await;
        let values: Vec<&str> = stats.daily_pnl_chart.split(',').collect();

        assert_eq!(values[0], "0.00");
        assert_eq!(values[1], "7.00");
    }
}
