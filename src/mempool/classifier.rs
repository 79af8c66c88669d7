//! Swap classification for decoded router calls.
//!
//! Direction is relative to the wrapped native asset:
//! - native → token = BUY
//! - token → native = SELL
//! - token → token  = SELL (of the input token)
//!
//! Suspicion is a pure threshold check on gas price and native-asset notional.
//! Thresholds come from `ClassifierConfig`; nothing here is hard-coded.

use alloy::primitives::U256;
use rust_decimal::prelude::*;

use crate::registry::{format_units, Registry};
use crate::types::{ClassifiedTx, Direction, RawTransaction};

use super::types::DecodedSwap;

const WEI_PER_GWEI: f64 = 1e9;

/// Suspicion thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Fee cap above which a swap is flagged (strictly greater)
    pub gas_price_threshold_gwei: f64,
    /// Native-asset notional above which a swap is flagged, in wei
    pub large_trade_threshold_wei: U256,
}

impl ClassifierConfig {
    pub fn new(gas_price_threshold_gwei: f64, large_trade_threshold_eth: Decimal) -> Self {
        Self {
            gas_price_threshold_gwei,
            large_trade_threshold_wei: eth_to_wei(large_trade_threshold_eth),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::new(100.0, Decimal::from(10))
    }
}

/// Build the classified record. Total: every decoded swap classifies.
pub fn classify(
    tx: &RawTransaction,
    decoded: &DecodedSwap,
    registry: &Registry,
    config: &ClassifierConfig,
) -> ClassifiedTx {
    let token_in_addr = decoded.token_in();
    let token_out_addr = decoded.token_out();
    let token_in = registry.token_metadata(token_in_addr);
    let token_out = registry.token_metadata(token_out_addr);

    let native_in = decoded.method.is_eth_in() || registry.is_wrapped_native(token_in_addr);
    let direction = if native_in { Direction::Buy } else { Direction::Sell };

    let gas_price_gwei = wei_to_gwei(tx.fee_cap_wei());
    let max_priority_fee_per_gas = tx.max_priority_fee_per_gas.map(wei_to_gwei);

    // msg.value for ETH-in methods equals amount_in; for token-in it is normally zero
    let native_notional = if native_in { decoded.amount_in } else { tx.value };

    let is_suspicious = gas_price_gwei > config.gas_price_threshold_gwei
        || native_notional > config.large_trade_threshold_wei;

    ClassifiedTx {
        tx_hash: tx.hash,
        from: tx.from,
        method: decoded.method,
        amount_in: format_units(decoded.amount_in, token_in.decimals),
        pair: registry.create_pair(token_in_addr, token_out_addr),
        token_in,
        token_out,
        direction,
        gas_price_gwei,
        max_priority_fee_per_gas,
        is_suspicious,
    }
}

pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / WEI_PER_GWEI
}

/// Whole-ETH decimal → wei. Negative clamps to zero, overflow to U256::MAX.
pub fn eth_to_wei(eth: Decimal) -> U256 {
    if eth.is_sign_negative() {
        return U256::ZERO;
    }
    match eth.checked_mul(Decimal::from(1_000_000_000_000_000_000u64)) {
        Some(wei) => wei.trunc().to_string().parse().unwrap_or(U256::MAX),
        None => U256::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mempool::types::SwapMethod;
    use crate::registry::mainnet::{PEPE, USDC, WETH};
    use alloy::primitives::{Address, Bytes, TxHash};
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn eth(n: &str) -> U256 {
        eth_to_wei(Decimal::from_str(n).unwrap())
    }

    fn tx_with_gas(gas_gwei: u128, value: U256) -> RawTransaction {
        RawTransaction {
            hash: TxHash::repeat_byte(0x12),
            from: Address::repeat_byte(0xab),
            to: Some(crate::registry::mainnet::UNISWAP_V2_ROUTER),
            value,
            gas_price: Some(gas_gwei * 1_000_000_000),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            input: Bytes::new(),
        }
    }

    fn eth_for_pepe(amount: U256) -> DecodedSwap {
        DecodedSwap {
            method: SwapMethod::SwapExactEthForTokens,
            amount_in: amount,
            amount_out_min: U256::from(1),
            path: vec![WETH, PEPE],
            recipient: Address::repeat_byte(0xab),
            deadline: U256::from(0x67a0b5ccu64),
        }
    }

    #[test]
    fn test_buy_scenario_normal_gas() {
        let reg = Registry::mainnet();
        let value = eth("1.5");
        let tx = tx_with_gas(50, value);
        let c = classify(&tx, &eth_for_pepe(value), &reg, &ClassifierConfig::default());

        assert_eq!(c.direction, Direction::Buy);
        assert_eq!(c.pair, "PEPE/WETH");
        assert_eq!(c.amount_in, "1.5");
        assert_eq!(c.token_in.symbol, "WETH");
        assert_eq!(c.token_out.symbol, "PEPE");
        assert_eq!(c.gas_price_gwei, 50.0);
        assert!(!c.is_suspicious);
        assert_eq!(c.tx_hash, tx.hash);
        assert_eq!(c.from, tx.from);
    }

    #[test]
    fn test_high_gas_only_changes_suspicion() {
        let reg = Registry::mainnet();
        let value = eth("1.5");
        let cfg = ClassifierConfig::default();
        let normal = classify(&tx_with_gas(50, value), &eth_for_pepe(value), &reg, &cfg);
        let high = classify(&tx_with_gas(150, value), &eth_for_pepe(value), &reg, &cfg);

        assert!(high.is_suspicious);
        assert_eq!(high.gas_price_gwei, 150.0);
        assert_eq!(high.direction, normal.direction);
        assert_eq!(high.pair, normal.pair);
        assert_eq!(high.amount_in, normal.amount_in);
        assert_eq!(high.token_in, normal.token_in);
        assert_eq!(high.token_out, normal.token_out);
    }

    #[test]
    fn test_gas_threshold_is_strict() {
        let reg = Registry::mainnet();
        let value = eth("1");
        let c = classify(&tx_with_gas(100, value), &eth_for_pepe(value), &reg, &ClassifierConfig::default());
        assert!(!c.is_suspicious);
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let reg = Registry::mainnet();
        let value = eth("1.5");
        let strict = ClassifierConfig::new(40.0, dec!(10));
        let c = classify(&tx_with_gas(50, value), &eth_for_pepe(value), &reg, &strict);
        assert!(c.is_suspicious);

        let small_trades = ClassifierConfig::new(100.0, dec!(1));
        let c = classify(&tx_with_gas(50, value), &eth_for_pepe(value), &reg, &small_trades);
        assert!(c.is_suspicious);
    }

    #[test]
    fn test_large_trade_flagged() {
        let reg = Registry::mainnet();
        let value = eth("25");
        let c = classify(&tx_with_gas(20, value), &eth_for_pepe(value), &reg, &ClassifierConfig::default());
        assert!(c.is_suspicious);
        assert_eq!(c.amount_in, "25");
    }

    #[test]
    fn test_eip1559_fee_fields() {
        let reg = Registry::mainnet();
        let value = eth("2");
        let mut tx = tx_with_gas(0, value);
        tx.gas_price = None;
        tx.max_fee_per_gas = Some(75_000_000_000);
        tx.max_priority_fee_per_gas = Some(2_000_000_000);

        let c = classify(&tx, &eth_for_pepe(value), &reg, &ClassifierConfig::default());
        assert_eq!(c.gas_price_gwei, 75.0);
        assert_eq!(c.max_priority_fee_per_gas, Some(2.0));
        assert!(!c.is_suspicious);
    }

    #[test]
    fn test_sell_to_native() {
        let reg = Registry::mainnet();
        let decoded = DecodedSwap {
            method: SwapMethod::SwapExactTokensForEth,
            amount_in: U256::from(100_500_000u64),
            amount_out_min: U256::ZERO,
            path: vec![USDC, WETH],
            recipient: Address::ZERO,
            deadline: U256::ZERO,
        };
        let c = classify(&tx_with_gas(30, U256::ZERO), &decoded, &reg, &ClassifierConfig::default());
        assert_eq!(c.direction, Direction::Sell);
        assert_eq!(c.amount_in, "100.5");
        assert_eq!(c.pair, reg.create_pair(WETH, USDC));
        assert!(!c.is_suspicious);
    }

    #[test]
    fn test_weth_token_in_is_buy() {
        let reg = Registry::mainnet();
        let decoded = DecodedSwap {
            method: SwapMethod::SwapExactTokensForTokens,
            amount_in: eth("12"),
            amount_out_min: U256::ZERO,
            path: vec![WETH, USDC, PEPE],
            recipient: Address::ZERO,
            deadline: U256::ZERO,
        };
        let c = classify(&tx_with_gas(30, U256::ZERO), &decoded, &reg, &ClassifierConfig::default());
        assert_eq!(c.direction, Direction::Buy);
        assert_eq!(c.token_out.symbol, "PEPE");
        assert!(c.is_suspicious, "12 WETH exceeds the 10 ETH default");
    }

    #[test]
    fn test_unknown_tokens_still_classify() {
        let reg = Registry::mainnet();
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        let decoded = DecodedSwap {
            method: SwapMethod::SwapExactTokensForTokens,
            amount_in: U256::from(10u64).pow(U256::from(18u64)),
            amount_out_min: U256::ZERO,
            path: vec![a, b],
            recipient: Address::ZERO,
            deadline: U256::ZERO,
        };
        let c = classify(&tx_with_gas(30, U256::ZERO), &decoded, &reg, &ClassifierConfig::default());
        assert_eq!(c.token_in.symbol, "UNKNOWN");
        assert_eq!(c.token_out.symbol, "UNKNOWN");
        assert_eq!(c.amount_in, "1");
        assert_eq!(c.pair, "UNKNOWN/UNKNOWN");
    }

    #[test]
    fn test_empty_path_classifies_as_unknown() {
        let reg = Registry::mainnet();
        let mut decoded = eth_for_pepe(eth("1"));
        decoded.path.clear();
        let c = classify(&tx_with_gas(30, eth("1")), &decoded, &reg, &ClassifierConfig::default());
        assert_eq!(c.token_out.symbol, "UNKNOWN");
        assert_eq!(c.direction, Direction::Buy);
    }

    #[test]
    fn test_eth_to_wei() {
        assert_eq!(eth_to_wei(dec!(1.5)), U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(eth_to_wei(dec!(10)), U256::from(10_000_000_000_000_000_000u128));
        assert_eq!(eth_to_wei(dec!(-1)), U256::ZERO);
        assert_eq!(eth_to_wei(Decimal::MAX), U256::MAX);
    }
}
