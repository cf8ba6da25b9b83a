use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::metrics::WindowStats;

/// The smart-money decision rule. Pure function of the aggregated stats:
/// recent activity, positive monthly PnL, a win rate and asset multiple
/// above the floor, and a transaction count low enough to rule out bots.
pub fn is_smart_wallet(stats_7d: &WindowStats, stats_30d: &WindowStats) -> bool {
    stats_7d.total_cost > Decimal::ZERO
        && stats_30d.pnl > Decimal::ZERO
        && stats_30d.win_rate > dec!(30)
        && stats_30d.asset_multiple > dec!(0.3)
        && stats_30d.total_transaction_num < 3000
}
