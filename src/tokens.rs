//! Well-known tokens per chain
//!
//! Used to fill in a task's token when its metadata leaves it out, and to
//! render amounts in logs.

use alloy::primitives::{address, utils::format_units, Address, U256};

/// Token metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: &'static str,
    pub decimals: u8,
}

pub mod chains {
    pub const ETHEREUM: u64 = 1;
    pub const OPTIMISM: u64 = 10;
    pub const BASE: u64 = 8453;
    pub const ARBITRUM: u64 = 42161;
}

pub mod addresses {
    use super::*;

    pub const USDC_ETH: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    pub const USDC_OPT: Address = address!("0b2c639c533813f4aa9d7837caf62653d097ff85");
    pub const USDC_BASE: Address = address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913");
    pub const USDC_ARB: Address = address!("af88d065e77c8cc2239327c5edb3a432268e5831");

    pub const WETH_ETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
    pub const WETH_L2: Address = address!("4200000000000000000000000000000000000006");
    pub const WETH_ARB: Address = address!("82af49447d8a07e3bd95bd0d56f35241523fbab1");
}

/// Native USDC on `chain_id`
pub fn usdc(chain_id: u64) -> Option<Address> {
    use addresses::*;
    match chain_id {
        chains::ETHEREUM => Some(USDC_ETH),
        chains::OPTIMISM => Some(USDC_OPT),
        chains::BASE => Some(USDC_BASE),
        chains::ARBITRUM => Some(USDC_ARB),
        _ => None,
    }
}

/// Metadata for a known token (addresses are unique across the chains above)
pub fn lookup(token: Address) -> Option<TokenInfo> {
    use addresses::*;
    match token {
        USDC_ETH | USDC_OPT | USDC_BASE | USDC_ARB => Some(TokenInfo {
            symbol: "USDC",
            decimals: 6,
        }),
        WETH_ETH | WETH_L2 | WETH_ARB => Some(TokenInfo {
            symbol: "WETH",
            decimals: 18,
        }),
        _ => None,
    }
}

/// Human-readable amount, e.g. `1.5 USDC`; raw units for unknown tokens
pub fn display_amount(token: Address, amount: U256) -> String {
    match lookup(token) {
        Some(info) => match format_units(amount, info.decimals) {
            Ok(units) => format!("{} {}", units, info.symbol),
            Err(_) => amount.to_string(),
        },
        None => amount.to_string(),
    }
}
