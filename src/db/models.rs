use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metrics::WindowStats;
use crate::types::{Chain, Direction};

/// One normalized swap, enriched with market data and the realized-PnL
/// outcome of replaying it through the cost-basis ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub wallet_address: String,
    pub signature: String,
    pub chain: Chain,
    pub token_address: String,
    pub token_name: String,
    pub token_icon: String,
    /// USD price implied by the trade itself (value / amount).
    pub price: Decimal,
    pub amount: Decimal,
    pub market_cap: Decimal,
    /// USD value of the quote leg.
    pub value: Decimal,
    /// Trade size relative to the position at execution time.
    pub holding_percentage: Decimal,
    pub realized_profit: Decimal,
    pub realized_profit_percentage: Decimal,
    pub transaction_type: Direction,
    pub transaction_time: i64,
    pub inserted_at: DateTime<Utc>,
}

/// Running cost-basis position for one (wallet, token) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub total_amount: Decimal,
    pub total_cost: Decimal,
    pub avg_buy_price: Decimal,
}

/// Classification output for one wallet, the pipeline's end product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    pub wallet_address: String,
    pub chain: Chain,
    /// Native balance in SOL.
    pub balance: Decimal,
    pub balance_usd: Decimal,
    pub tag: String,
    pub is_smart_wallet: bool,
    /// Wallets fall out of the active set instead of being deleted, so a
    /// later cycle can reinstate them without losing history.
    pub is_active: bool,
    pub wallet_type: i32,
    pub asset_multiple: Decimal,
    /// Up to three most recently traded token mints, comma joined.
    pub token_list: String,
    pub stats_1d: WindowStats,
    pub stats_7d: WindowStats,
    pub stats_30d: WindowStats,
    pub last_transaction_time: i64,
    pub updated_at: DateTime<Utc>,
}

/// Open position projected from the trade history, valued at current prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub wallet_address: String,
    pub token_address: String,
    pub token_name: String,
    pub token_icon: String,
    pub chain: Chain,
    pub buy_amount: Decimal,
    pub sell_amount: Decimal,
    /// buy_amount - sell_amount, always positive for a stored row.
    pub amount: Decimal,
    /// Position value in the quote asset.
    pub value: Decimal,
    pub value_usd: Decimal,
    pub cost: Decimal,
    pub realized_profit: Decimal,
    pub unrealized_profit: Decimal,
    /// realized_profit + unrealized_profit.
    pub pnl: Decimal,
    pub pnl_percentage: Decimal,
    pub avg_price: Decimal,
    pub market_cap: Decimal,
    pub last_transaction_time: i64,
    pub updated_at: DateTime<Utc>,
}
