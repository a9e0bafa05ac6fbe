//! Implied token prices for weighted pools and how far stablecoins trade from their peg.

use std::collections::HashMap;

use thiserror::Error;

pub const DEPEG_DECIMALS: i32 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("no decimals known for token {0}")]
    UnknownDecimals(String),
    #[error("token sequences are misaligned, names: {names}, weights: {weights}, balances: {balances}")]
    MisalignedTokens {
        names: usize,
        weights: usize,
        balances: usize,
    },
}

/// Decimals per token name. Balances come back from subgraphs as raw integer amounts.
#[derive(Clone, Debug, Default)]
pub struct TokenDecimals(HashMap<String, u32>);

impl TokenDecimals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stablecoins and majors the dashboards track.
    pub fn with_defaults() -> Self {
        let mut decimals = Self::new();
        for (name, count) in [
            ("Dai Stablecoin", 18),
            ("DAI", 18),
            ("USD Coin", 6),
            ("USDC", 6),
            ("Tether USD", 6),
            ("USDT", 6),
            ("TrueUSD", 18),
            ("TUSD", 18),
            ("Pax Dollar", 18),
            ("USDP", 18),
            ("Gemini dollar", 2),
            ("GUSD", 2),
            ("Frax", 18),
            ("FRAX", 18),
            ("LUSD Stablecoin", 18),
            ("LUSD", 18),
            ("Wrapped Ether", 18),
            ("WETH", 18),
            ("Wrapped BTC", 8),
            ("WBTC", 8),
        ] {
            decimals.insert(name, count);
        }
        decimals
    }

    pub fn insert(&mut self, name: &str, decimals: u32) {
        self.0.insert(name.to_string(), decimals);
    }

    pub fn get(&self, name: &str) -> Result<u32, PricingError> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| PricingError::UnknownDecimals(name.to_string()))
    }
}

/// Price of one token implied by its share of pool TVL. A zero balance prices at exactly zero.
pub fn token_price(total_value_locked_usd: f64, weight: f64, balance: f64, decimals: u32) -> f64 {
    if balance == 0.0 {
        return 0.0;
    }

    let amount = balance / 10f64.powi(decimals as i32);
    (total_value_locked_usd * weight) / amount
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Positive means trading below peg, negative above.
pub fn depeg(price: f64) -> f64 {
    round_to(1.0 - price, DEPEG_DECIMALS)
}

#[derive(Clone, Debug, PartialEq)]
pub struct TokenPricing {
    pub price: f64,
    pub depeg: f64,
}

/// Prices every token position of one snapshot. Position `i` of each slice must describe the
/// same token.
pub fn price_tokens(
    total_value_locked_usd: f64,
    names: &[String],
    weights: &[f64],
    balances: &[f64],
    token_decimals: &TokenDecimals,
) -> Result<Vec<TokenPricing>, PricingError> {
    if names.len() != weights.len() || names.len() != balances.len() {
        return Err(PricingError::MisalignedTokens {
            names: names.len(),
            weights: weights.len(),
            balances: balances.len(),
        });
    }

    names
        .iter()
        .zip(weights)
        .zip(balances)
        .map(|((name, &weight), &balance)| {
            let decimals = token_decimals.get(name)?;
            let price = token_price(total_value_locked_usd, weight, balance, decimals);
            Ok(TokenPricing {
                price,
                depeg: depeg(price),
            })
        })
        .collect()
}
