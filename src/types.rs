use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wrapped SOL, the quote asset every tracked trade is valued against.
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
/// USDC
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
/// USDT
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

pub fn is_stablecoin(token: &str) -> bool {
    token == USDC_MINT || token == USDT_MINT
}

/// True for the quote asset, whether given as the mint or the bare symbol
/// (the description strategy only sees symbols).
pub fn is_quote_asset(token: &str) -> bool {
    token == SOL_MINT || token == "SOL"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Solana => write!(f, "SOLANA"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TimeWindow {
    pub fn to_days(&self) -> i64 {
        match self {
            TimeWindow::Day => 1,
            TimeWindow::Week => 7,
            TimeWindow::Month => 30,
        }
    }
}

pub fn validate_solana_address(address: &str) -> bool {
    if address.len() < 32 || address.len() > 44 {
        return false;
    }
    bs58::decode(address).into_vec().is_ok()
}

/// Scale a raw integer amount string by the token's decimals.
/// Returns zero for unparseable input or absurd scales.
pub fn scale_raw_amount(raw: &str, decimals: u8) -> Decimal {
    if decimals > 28 {
        return Decimal::ZERO;
    }
    raw.parse::<i128>()
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, decimals as u32).ok())
        .unwrap_or_default()
}

/// Lamports (as the raw string Helius sends) to whole SOL.
pub fn lamports_str_to_sol(raw: &str) -> Decimal {
    scale_raw_amount(raw, 9)
}

pub fn lamports_to_sol(lamports: i64) -> Decimal {
    Decimal::try_from_i128_with_scale(lamports as i128, 9).unwrap_or_default()
}
