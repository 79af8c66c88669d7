// Core data structures shared by the registry, decoder, classifier and listener

use alloy::primitives::{Address, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::mempool::types::SwapMethod;

/// Symbol used for tokens missing from the registry
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Decimals assumed for tokens missing from the registry
pub const DEFAULT_DECIMALS: u8 = 18;

/// Static token metadata, loaded once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenMetadata {
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }

    /// Placeholder for an address the registry does not know
    pub fn unknown(address: Address) -> Self {
        Self::new(address, UNKNOWN_SYMBOL, DEFAULT_DECIMALS)
    }

    pub fn is_unknown(&self) -> bool {
        self.symbol == UNKNOWN_SYMBOL
    }
}

/// Pending transaction as delivered by the upstream feed.
/// Legacy transactions carry `gas_price`; EIP-1559 ones carry the two fee caps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub hash: TxHash,
    pub from: Address,
    /// None for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub input: Bytes,
}

impl RawTransaction {
    /// Effective fee cap in wei: legacy gas price, else maxFeePerGas
    pub fn fee_cap_wei(&self) -> u128 {
        self.gas_price.or(self.max_fee_per_gas).unwrap_or(0)
    }
}

/// Swap direction relative to the wrapped native asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Native asset in, token out
    Buy,
    /// Token in (native or other token out)
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Fully classified swap handed to the caller's handler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedTx {
    pub tx_hash: TxHash,
    pub from: Address,
    pub method: SwapMethod,
    pub token_in: TokenMetadata,
    pub token_out: TokenMetadata,
    /// Human-readable amount in `token_in` units, e.g. "1.5"
    pub amount_in: String,
    pub direction: Direction,
    /// Canonical pair label, e.g. "PEPE/WETH"
    pub pair: String,
    pub gas_price_gwei: f64,
    pub max_priority_fee_per_gas: Option<f64>,
    pub is_suspicious: bool,
}

impl ClassifiedTx {
    /// One-line summary for log output
    pub fn summary(&self) -> String {
        let flag = if self.is_suspicious { " [SUSPICIOUS]" } else { "" };
        format!(
            "{} {} {} -> {} | {} | {:.2} gwei{}",
            self.direction,
            self.amount_in,
            self.token_in.symbol,
            self.token_out.symbol,
            self.pair,
            self.gas_price_gwei,
            flag,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn sample() -> ClassifiedTx {
        ClassifiedTx {
            tx_hash: TxHash::ZERO,
            from: Address::ZERO,
            method: SwapMethod::SwapExactEthForTokens,
            token_in: TokenMetadata::new(
                address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
                "WETH",
                18,
            ),
            token_out: TokenMetadata::new(
                address!("6982508145454Ce325dDbE47a25d4ec3d2311933"),
                "PEPE",
                18,
            ),
            amount_in: "1.5".to_string(),
            direction: Direction::Buy,
            pair: "PEPE/WETH".to_string(),
            gas_price_gwei: 50.0,
            max_priority_fee_per_gas: None,
            is_suspicious: false,
        }
    }

    #[test]
    fn test_summary() {
        assert_eq!(sample().summary(), "BUY 1.5 WETH -> PEPE | PEPE/WETH | 50.00 gwei");
    }

    #[test]
    fn test_summary_flags_suspicious() {
        let mut tx = sample();
        tx.is_suspicious = true;
        assert!(tx.summary().ends_with("[SUSPICIOUS]"));
    }

    #[test]
    fn test_fee_cap_prefers_legacy_gas_price() {
        let mut raw = RawTransaction {
            hash: TxHash::ZERO,
            from: Address::ZERO,
            to: None,
            value: U256::ZERO,
            gas_price: Some(50),
            max_fee_per_gas: Some(75),
            max_priority_fee_per_gas: Some(2),
            input: Bytes::new(),
        };
        assert_eq!(raw.fee_cap_wei(), 50);
        raw.gas_price = None;
        assert_eq!(raw.fee_cap_wei(), 75);
        raw.max_fee_per_gas = None;
        assert_eq!(raw.fee_cap_wei(), 0);
    }

    #[test]
    fn test_unknown_token() {
        let meta = TokenMetadata::unknown(Address::ZERO);
        assert!(meta.is_unknown());
        assert_eq!(meta.decimals, 18);
    }
}
