//! Mempool Watcher - Type Definitions
//!
//! Purpose:
//!     Swap method table (selector → calldata layout), decoder output,
//!     listener state machine states, stats snapshot and owner events.
//!
//! Dependencies:
//!     - alloy (Address, U256)
//!     - chrono (window timestamps)

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::error::ListenerError;

// ── Swap method table ───────────────────────────────────────────────

/// V2-style router swap methods the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SwapMethod {
    SwapExactEthForTokens,
    SwapEthForExactTokens,
    SwapExactEthForTokensSupportingFeeOnTransferTokens,
    SwapExactTokensForEth,
    SwapExactTokensForEthSupportingFeeOnTransferTokens,
    SwapTokensForExactEth,
    SwapExactTokensForTokens,
    SwapExactTokensForTokensSupportingFeeOnTransferTokens,
    SwapTokensForExactTokens,
}

/// Word positions of a method's parameters, counted from the start of the
/// parameter block (the byte after the selector).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalldataLayout {
    /// Word holding amountIn / amountInMax. None when the input amount is msg.value.
    pub amount_in: Option<usize>,
    /// Word holding amountOutMin (or the exact amountOut)
    pub amount_out: usize,
    /// Word holding the byte offset of the `address[] path` tail
    pub path_offset: usize,
    pub recipient: usize,
    pub deadline: usize,
}

// swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline)
const ETH_IN_LAYOUT: CalldataLayout = CalldataLayout {
    amount_in: None,
    amount_out: 0,
    path_offset: 1,
    recipient: 2,
    deadline: 3,
};

// swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline)
const TOKEN_IN_LAYOUT: CalldataLayout = CalldataLayout {
    amount_in: Some(0),
    amount_out: 1,
    path_offset: 2,
    recipient: 3,
    deadline: 4,
};

// swapTokensForExactTokens(uint256 amountOut, uint256 amountInMax, address[] path, address to, uint256 deadline)
const TOKEN_IN_EXACT_OUT_LAYOUT: CalldataLayout = CalldataLayout {
    amount_in: Some(1),
    amount_out: 0,
    path_offset: 2,
    recipient: 3,
    deadline: 4,
};

impl SwapMethod {
    pub const ALL: [SwapMethod; 9] = [
        SwapMethod::SwapExactEthForTokens,
        SwapMethod::SwapEthForExactTokens,
        SwapMethod::SwapExactEthForTokensSupportingFeeOnTransferTokens,
        SwapMethod::SwapExactTokensForEth,
        SwapMethod::SwapExactTokensForEthSupportingFeeOnTransferTokens,
        SwapMethod::SwapTokensForExactEth,
        SwapMethod::SwapExactTokensForTokens,
        SwapMethod::SwapExactTokensForTokensSupportingFeeOnTransferTokens,
        SwapMethod::SwapTokensForExactTokens,
    ];

    pub fn selector(&self) -> [u8; 4] {
        match self {
            SwapMethod::SwapExactEthForTokens => [0x7f, 0xf3, 0x6a, 0xb5],
            SwapMethod::SwapEthForExactTokens => [0xfb, 0x3b, 0xdb, 0x41],
            SwapMethod::SwapExactEthForTokensSupportingFeeOnTransferTokens => [0xb6, 0xf9, 0xde, 0x95],
            SwapMethod::SwapExactTokensForEth => [0x18, 0xcb, 0xaf, 0xe5],
            SwapMethod::SwapExactTokensForEthSupportingFeeOnTransferTokens => [0x79, 0x1a, 0xc9, 0x47],
            SwapMethod::SwapTokensForExactEth => [0x4a, 0x25, 0xd9, 0x4a],
            SwapMethod::SwapExactTokensForTokens => [0x38, 0xed, 0x17, 0x39],
            SwapMethod::SwapExactTokensForTokensSupportingFeeOnTransferTokens => [0x5c, 0x11, 0xd7, 0x95],
            SwapMethod::SwapTokensForExactTokens => [0x88, 0x03, 0xdb, 0xee],
        }
    }

    pub fn from_selector(selector: [u8; 4]) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.selector() == selector)
    }

    /// Solidity function name
    pub fn name(&self) -> &'static str {
        match self {
            SwapMethod::SwapExactEthForTokens => "swapExactETHForTokens",
            SwapMethod::SwapEthForExactTokens => "swapETHForExactTokens",
            SwapMethod::SwapExactEthForTokensSupportingFeeOnTransferTokens => {
                "swapExactETHForTokensSupportingFeeOnTransferTokens"
            }
            SwapMethod::SwapExactTokensForEth => "swapExactTokensForETH",
            SwapMethod::SwapExactTokensForEthSupportingFeeOnTransferTokens => {
                "swapExactTokensForETHSupportingFeeOnTransferTokens"
            }
            SwapMethod::SwapTokensForExactEth => "swapTokensForExactETH",
            SwapMethod::SwapExactTokensForTokens => "swapExactTokensForTokens",
            SwapMethod::SwapExactTokensForTokensSupportingFeeOnTransferTokens => {
                "swapExactTokensForTokensSupportingFeeOnTransferTokens"
            }
            SwapMethod::SwapTokensForExactTokens => "swapTokensForExactTokens",
        }
    }

    /// True when the input amount is msg.value rather than a calldata word
    pub fn is_eth_in(&self) -> bool {
        self.layout().amount_in.is_none()
    }

    /// True when the router unwraps the output and pays native ETH
    pub fn is_eth_out(&self) -> bool {
        matches!(
            self,
            SwapMethod::SwapExactTokensForEth
                | SwapMethod::SwapExactTokensForEthSupportingFeeOnTransferTokens
                | SwapMethod::SwapTokensForExactEth
        )
    }

    pub fn layout(&self) -> CalldataLayout {
        match self {
            SwapMethod::SwapExactEthForTokens
            | SwapMethod::SwapEthForExactTokens
            | SwapMethod::SwapExactEthForTokensSupportingFeeOnTransferTokens => ETH_IN_LAYOUT,
            SwapMethod::SwapExactTokensForEth
            | SwapMethod::SwapExactTokensForEthSupportingFeeOnTransferTokens
            | SwapMethod::SwapExactTokensForTokens
            | SwapMethod::SwapExactTokensForTokensSupportingFeeOnTransferTokens => TOKEN_IN_LAYOUT,
            SwapMethod::SwapTokensForExactEth | SwapMethod::SwapTokensForExactTokens => {
                TOKEN_IN_EXACT_OUT_LAYOUT
            }
        }
    }
}

impl fmt::Display for SwapMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded swap calldata, produced by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSwap {
    pub method: SwapMethod,
    /// Raw input amount: msg.value for ETH-in methods, calldata otherwise.
    /// For exact-output methods this is the maximum the sender will spend.
    pub amount_in: U256,
    /// Minimum output amount (exact output amount for exact-output methods)
    pub amount_out_min: U256,
    /// Hop sequence, always at least two entries
    pub path: Vec<Address>,
    pub recipient: Address,
    pub deadline: U256,
}

impl DecodedSwap {
    /// First hop. The decoder never emits a path shorter than two; a
    /// hand-built empty path yields the zero address.
    pub fn token_in(&self) -> Address {
        self.path.first().copied().unwrap_or(Address::ZERO)
    }

    pub fn token_out(&self) -> Address {
        self.path.last().copied().unwrap_or(Address::ZERO)
    }
}

// ── Listener state ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListenerState {
    Disconnected,
    Connecting,
    Subscribed,
    Reconnecting,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ListenerState::Disconnected => write!(f, "DISCONNECTED"),
            ListenerState::Connecting => write!(f, "CONNECTING"),
            ListenerState::Subscribed => write!(f, "SUBSCRIBED"),
            ListenerState::Reconnecting => write!(f, "RECONNECTING"),
        }
    }
}

/// Point-in-time copy of the listener counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerStats {
    pub connected: bool,
    pub total_transactions_received: u64,
    pub total_transactions_decoded: u64,
    pub reconnect_attempts: u64,
    pub window_start: DateTime<Utc>,
    pub window_count: u64,
    /// Derived from the window at snapshot time
    pub transactions_per_minute: f64,
}

/// Events delivered to the listener's owner
#[derive(Debug, Clone)]
pub enum ListenerEvent {
    /// Reconnect attempts exhausted; the listener is Disconnected
    Fatal(ListenerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_endpoints_tolerate_empty_path() {
        let mut swap = DecodedSwap {
            method: SwapMethod::SwapExactTokensForTokens,
            amount_in: U256::from(1),
            amount_out_min: U256::ZERO,
            path: vec![Address::repeat_byte(0x01), Address::repeat_byte(0x02), Address::repeat_byte(0x03)],
            recipient: Address::ZERO,
            deadline: U256::ZERO,
        };
        assert_eq!(swap.token_in(), Address::repeat_byte(0x01));
        assert_eq!(swap.token_out(), Address::repeat_byte(0x03));

        swap.path.clear();
        assert_eq!(swap.token_in(), Address::ZERO);
        assert_eq!(swap.token_out(), Address::ZERO);
    }

    #[test]
    fn test_selectors_are_unique() {
        for (i, a) in SwapMethod::ALL.iter().enumerate() {
            for b in &SwapMethod::ALL[i + 1..] {
                assert_ne!(a.selector(), b.selector(), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_from_selector() {
        assert_eq!(
            SwapMethod::from_selector([0x7f, 0xf3, 0x6a, 0xb5]),
            Some(SwapMethod::SwapExactEthForTokens)
        );
        assert_eq!(SwapMethod::from_selector([0x12, 0x34, 0x56, 0x78]), None);
    }

    #[test]
    fn test_eth_in_methods() {
        let eth_in: Vec<_> = SwapMethod::ALL.iter().filter(|m| m.is_eth_in()).collect();
        assert_eq!(eth_in.len(), 3);
        assert!(SwapMethod::SwapEthForExactTokens.is_eth_in());
        assert!(!SwapMethod::SwapTokensForExactEth.is_eth_in());
        assert!(SwapMethod::SwapTokensForExactEth.is_eth_out());
        assert!(!SwapMethod::SwapExactTokensForTokens.is_eth_out());
        assert!(SwapMethod::ALL.iter().all(|m| !(m.is_eth_in() && m.is_eth_out())));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(SwapMethod::SwapExactEthForTokens.to_string(), "swapExactETHForTokens");
    }
}
