use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::indexer::helius::{EnhancedTransaction, TokenTransfer};
use crate::types::{
    is_quote_asset, is_stablecoin, lamports_str_to_sol, lamports_to_sol, scale_raw_amount,
    Direction, SOL_MINT,
};

/// A swap reduced to its two legs, however the source transaction encoded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Swap {
    pub signature: String,
    pub timestamp: i64,
    pub direction: Direction,
    pub sold_token: String,
    pub sold_amount: Decimal,
    pub bought_token: String,
    pub bought_amount: Decimal,
    /// USD value of the quote leg.
    pub quote_value: Decimal,
}

impl Swap {
    /// The non-quote side, the token the trade is about.
    pub fn token_address(&self) -> &str {
        match self.direction {
            Direction::Buy => &self.bought_token,
            Direction::Sell => &self.sold_token,
        }
    }

    pub fn token_amount(&self) -> Decimal {
        match self.direction {
            Direction::Buy => self.bought_amount,
            Direction::Sell => self.sold_amount,
        }
    }
}

/// Normalize one enhanced transaction into a tradeable swap.
///
/// Three strategies run in order of fidelity: the structured swap event,
/// then token transfer balance deltas, then the human-readable description.
/// Whatever survives still has to pass the tradeability filter, so a swap
/// between quote assets never reaches the ledger regardless of which
/// strategy produced it.
pub fn normalize(tx: &EnhancedTransaction, wallet: &str, native_price: Decimal) -> Option<Swap> {
    let swap = from_swap_event(tx, wallet, native_price)
        .or_else(|| from_balance_delta(tx, wallet, native_price))
        .or_else(|| from_description(tx, native_price))?;

    if should_skip(&swap) {
        tracing::trace!(signature = %swap.signature, "Dropping non-tradeable swap");
        return None;
    }
    Some(swap)
}

/// Quote or stable in either spelling: description strings carry bare
/// symbols, the other strategies carry mints.
fn is_quote_or_stable(token: &str) -> bool {
    is_quote_asset(token) || is_stablecoin(token) || token == "USDC" || token == "USDT"
}

fn quote_leg_value(token: &str, amount: Decimal, native_price: Decimal) -> Decimal {
    if is_quote_asset(token) {
        amount * native_price
    } else if is_quote_or_stable(token) {
        amount
    } else {
        Decimal::ZERO
    }
}

fn from_swap_event(
    tx: &EnhancedTransaction,
    wallet: &str,
    native_price: Decimal,
) -> Option<Swap> {
    let swap = tx.events.as_ref()?.swap.as_ref()?;

    if let Some(native_in) = &swap.native_input {
        let sol_amount = lamports_str_to_sol(&native_in.amount);
        let out = swap
            .token_outputs
            .iter()
            .find(|t| t.user_account == wallet)
            .or_else(|| swap.token_outputs.first())?;
        return Some(Swap {
            signature: tx.signature.clone(),
            timestamp: tx.timestamp,
            direction: Direction::Buy,
            sold_token: SOL_MINT.to_string(),
            sold_amount: sol_amount,
            bought_token: out.mint.clone(),
            bought_amount: scale_raw_amount(
                &out.raw_token_amount.token_amount,
                out.raw_token_amount.decimals,
            ),
            quote_value: sol_amount * native_price,
        });
    }

    if let Some(native_out) = &swap.native_output {
        let sol_amount = lamports_str_to_sol(&native_out.amount);
        let input = swap
            .token_inputs
            .iter()
            .find(|t| t.user_account == wallet)
            .or_else(|| swap.token_inputs.first())?;
        return Some(Swap {
            signature: tx.signature.clone(),
            timestamp: tx.timestamp,
            direction: Direction::Sell,
            sold_token: input.mint.clone(),
            sold_amount: scale_raw_amount(
                &input.raw_token_amount.token_amount,
                input.raw_token_amount.decimals,
            ),
            bought_token: SOL_MINT.to_string(),
            bought_amount: sol_amount,
            quote_value: sol_amount * native_price,
        });
    }

    // Token-to-token swap events have no native leg; let the other
    // strategies try.
    None
}

fn from_balance_delta(
    tx: &EnhancedTransaction,
    wallet: &str,
    native_price: Decimal,
) -> Option<Swap> {
    let transfer = tx.token_transfers.as_ref()?.first()?;
    let amount = Decimal::try_from(transfer.token_amount).ok()?;

    let (direction, counterparty) = if transfer.from_user_account.as_deref() == Some(wallet) {
        (Direction::Sell, transfer.to_user_account.as_deref()?)
    } else if transfer.to_user_account.as_deref() == Some(wallet) {
        (Direction::Buy, transfer.from_user_account.as_deref()?)
    } else {
        return None;
    };

    // The counterparty's lamport delta is the other leg of the swap.
    let lamports = tx
        .account_data
        .as_ref()?
        .iter()
        .find(|a| a.account == counterparty)
        .map(|a| a.native_balance_change.abs())?;
    let sol_amount = lamports_to_sol(lamports);

    let swap = match direction {
        Direction::Sell => Swap {
            signature: tx.signature.clone(),
            timestamp: tx.timestamp,
            direction,
            sold_token: transfer.mint.clone(),
            sold_amount: amount,
            bought_token: SOL_MINT.to_string(),
            bought_amount: sol_amount,
            quote_value: sol_amount * native_price,
        },
        Direction::Buy => Swap {
            signature: tx.signature.clone(),
            timestamp: tx.timestamp,
            direction,
            sold_token: SOL_MINT.to_string(),
            sold_amount: sol_amount,
            bought_token: transfer.mint.clone(),
            bought_amount: amount,
            quote_value: sol_amount * native_price,
        },
    };
    Some(swap)
}

fn description_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"swapped ([\d\.]+) ([\w\d\$\-]+) for ([\d\.]+) ([\w\d\$\-]+)")
            .expect("valid literal pattern")
    })
}

fn from_description(tx: &EnhancedTransaction, native_price: Decimal) -> Option<Swap> {
    let description = tx.description.as_deref()?;
    let captures = description_pattern().captures(description)?;

    let sold_amount: Decimal = captures[1].parse().ok()?;
    let sold_symbol = &captures[2];
    let bought_amount: Decimal = captures[3].parse().ok()?;
    let bought_symbol = &captures[4];

    let transfers = tx.token_transfers.as_deref();
    let sold_token = repair_mint(sold_symbol, sold_amount, transfers);
    let bought_token = repair_mint(bought_symbol, bought_amount, transfers);

    let (direction, quote_value) = if is_quote_or_stable(&sold_token) {
        (
            Direction::Buy,
            quote_leg_value(&sold_token, sold_amount, native_price),
        )
    } else {
        (
            Direction::Sell,
            quote_leg_value(&bought_token, bought_amount, native_price),
        )
    };

    Some(Swap {
        signature: tx.signature.clone(),
        timestamp: tx.timestamp,
        direction,
        sold_token,
        sold_amount,
        bought_token,
        bought_amount,
        quote_value,
    })
}

/// The description only carries symbols. Recover the mint from the
/// transfer whose amount matches the parsed leg.
fn repair_mint(symbol: &str, amount: Decimal, transfers: Option<&[TokenTransfer]>) -> String {
    if symbol == "SOL" {
        return SOL_MINT.to_string();
    }
    if let Some(transfers) = transfers {
        for transfer in transfers {
            if transfer.mint.is_empty() {
                continue;
            }
            let transferred = Decimal::try_from(transfer.token_amount).unwrap_or_default();
            if amounts_match(transferred, amount) {
                return transfer.mint.clone();
            }
        }
    }
    symbol.to_string()
}

/// Within 1%, enough slack for the float round-trip through the transfer
/// amount.
fn amounts_match(a: Decimal, b: Decimal) -> bool {
    let tolerance = a.abs().max(b.abs()) * dec!(0.01);
    (a - b).abs() <= tolerance
}

fn should_skip(swap: &Swap) -> bool {
    let sold_quote = is_quote_or_stable(&swap.sold_token);
    let bought_quote = is_quote_or_stable(&swap.bought_token);

    // Rebalancing between quote assets, or a pair with no quote leg at
    // all, says nothing about trading skill.
    if sold_quote == bought_quote {
        return true;
    }

    let token = swap.token_address();
    if token.is_empty() || token == SOL_MINT {
        return true;
    }
    swap.token_amount() <= Decimal::ZERO
}
