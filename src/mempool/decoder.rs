//! Mempool Watcher - Calldata Decoder
//!
//! Purpose:
//!     Decode V2-style router swap calldata from pending transaction input bytes.
//!     Fixed-signature dispatch keyed by selector; no general ABI decoding.
//!
//! Dependencies:
//!     - alloy (Address, U256)
//!
//! Supported Function Selectors:
//!     0x7ff36ab5: swapExactETHForTokens
//!     0xfb3bdb41: swapETHForExactTokens
//!     0xb6f9de95: swapExactETHForTokensSupportingFeeOnTransferTokens
//!     0x18cbafe5: swapExactTokensForETH
//!     0x791ac947: swapExactTokensForETHSupportingFeeOnTransferTokens
//!     0x4a25d94a: swapTokensForExactETH
//!     0x38ed1739: swapExactTokensForTokens
//!     0x5c11d795: swapExactTokensForTokensSupportingFeeOnTransferTokens
//!     0x8803dbee: swapTokensForExactTokens
//!
//! Notes:
//!     Every read is bounds-checked. Malformed calldata returns None, it never
//!     panics and never surfaces as an error.

use alloy::primitives::{Address, Bytes, U256};
use tracing::trace;

use crate::registry::Registry;
use crate::types::RawTransaction;

use super::types::{DecodedSwap, SwapMethod};

/// ABI word size in bytes
const WORD: usize = 32;

/// Decode a pending transaction addressed to a monitored router.
/// Returns None for non-router targets, missing selectors, unknown selectors
/// and malformed parameter blocks.
pub fn decode(tx: &RawTransaction, registry: &Registry) -> Option<DecodedSwap> {
    let to = tx.to?;
    if !registry.is_monitored_router(to) {
        return None;
    }
    decode_calldata(&tx.input, tx.value)
}

/// Decode raw calldata. `value` is the transaction's msg.value, used as the
/// input amount for ETH-in methods.
pub fn decode_calldata(input: &[u8], value: U256) -> Option<DecodedSwap> {
    if input.len() < 4 {
        return None;
    }

    let selector: [u8; 4] = input[..4].try_into().ok()?;
    let method = match SwapMethod::from_selector(selector) {
        Some(m) => m,
        None => {
            trace!("Unknown selector: {}", selector_hex(input));
            return None;
        }
    };

    let result = decode_params(method, &input[4..], value);
    if result.is_none() {
        trace!("Malformed {} calldata ({} bytes)", method, input.len());
    }
    result
}

/// Return the 4-byte selector as a hex string for logging
pub fn selector_hex(input: &[u8]) -> String {
    if input.len() < 4 {
        return "0x????".to_string();
    }
    format!("0x{:02x}{:02x}{:02x}{:02x}", input[0], input[1], input[2], input[3])
}

/// True if `selector` names one of the supported swap methods
pub fn is_swap_method(selector: [u8; 4]) -> bool {
    SwapMethod::from_selector(selector).is_some()
}

/// Solidity name for a supported selector
pub fn method_name(selector: [u8; 4]) -> Option<&'static str> {
    SwapMethod::from_selector(selector).map(|m| m.name())
}

/// Standard ABI encoding of a supported swap call: selector, head words,
/// then the `address[] path` tail. Used by the demo feed.
pub fn encode_calldata(swap: &DecodedSwap) -> Bytes {
    let layout = swap.method.layout();
    let head_len = if layout.amount_in.is_some() { 5 } else { 4 };

    let mut head = vec![[0u8; WORD]; head_len];
    if let Some(index) = layout.amount_in {
        head[index] = swap.amount_in.to_be_bytes::<WORD>();
    }
    head[layout.amount_out] = swap.amount_out_min.to_be_bytes::<WORD>();
    head[layout.path_offset] = U256::from(head_len * WORD).to_be_bytes::<WORD>();
    head[layout.recipient] = address_word(swap.recipient);
    head[layout.deadline] = swap.deadline.to_be_bytes::<WORD>();

    let mut out = Vec::with_capacity(4 + (head_len + 1 + swap.path.len()) * WORD);
    out.extend_from_slice(&swap.method.selector());
    for word in &head {
        out.extend_from_slice(word);
    }
    out.extend_from_slice(&U256::from(swap.path.len()).to_be_bytes::<WORD>());
    for addr in &swap.path {
        out.extend_from_slice(&address_word(*addr));
    }
    Bytes::from(out)
}

fn address_word(addr: Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(addr.as_slice());
    word
}

fn decode_params(method: SwapMethod, params: &[u8], value: U256) -> Option<DecodedSwap> {
    let layout = method.layout();
    let block = ParamBlock::new(params);

    let amount_in = match layout.amount_in {
        Some(index) => block.uint(index)?,
        None => value,
    };
    let amount_out_min = block.uint(layout.amount_out)?;
    let recipient = block.address(layout.recipient)?;
    let deadline = block.uint(layout.deadline)?;
    let path = block.address_array(layout.path_offset)?;

    if path.len() < 2 {
        return None;
    }

    Some(DecodedSwap {
        method,
        amount_in,
        amount_out_min,
        path,
        recipient,
        deadline,
    })
}

// ── Word Access ─────────────────────────────────────────────────────

/// Parameter block following the selector, read as 32-byte words.
struct ParamBlock<'a> {
    data: &'a [u8],
}

impl<'a> ParamBlock<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// 32 bytes starting at an arbitrary byte offset
    fn word_at(&self, byte_offset: usize) -> Option<&'a [u8]> {
        let end = byte_offset.checked_add(WORD)?;
        self.data.get(byte_offset..end)
    }

    fn word_at_byte(&self, byte_offset: usize) -> Option<U256> {
        self.word_at(byte_offset).map(U256::from_be_slice)
    }

    /// Head word `index` as uint256
    fn uint(&self, index: usize) -> Option<U256> {
        self.word_at_byte(index.checked_mul(WORD)?)
    }

    /// Head word `index` as an address (low 20 bytes)
    fn address(&self, index: usize) -> Option<Address> {
        let word = self.word_at(index.checked_mul(WORD)?)?;
        Some(Address::from_slice(&word[12..]))
    }

    /// Dynamic `address[]` whose head word `index` holds the byte offset of
    /// the tail. The tail is a length word N followed by N address words.
    fn address_array(&self, index: usize) -> Option<Vec<Address>> {
        let offset = to_usize(self.uint(index)?)?;
        let len = to_usize(self.word_at_byte(offset)?)?;

        let items_start = offset.checked_add(WORD)?;
        let items_end = len.checked_mul(WORD)?.checked_add(items_start)?;
        if items_end > self.data.len() {
            return None;
        }

        let path = (0..len)
            .map(|i| {
                let word = &self.data[items_start + i * WORD..items_start + (i + 1) * WORD];
                Address::from_slice(&word[12..])
            })
            .collect();
        Some(path)
    }
}

fn to_usize(value: U256) -> Option<usize> {
    let v = u64::try_from(value).ok()?;
    usize::try_from(v).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::mainnet::{PEPE, UNISWAP_V2_ROUTER, USDC, WETH};
    use alloy::primitives::hex;
    use alloy::primitives::TxHash;

    fn swap(method: SwapMethod, amount_in: U256, amount_out_min: U256, path: &[Address]) -> DecodedSwap {
        DecodedSwap {
            method,
            amount_in,
            amount_out_min,
            path: path.to_vec(),
            recipient: Address::repeat_byte(0x11),
            deadline: U256::from(99),
        }
    }

    fn raw_tx(to: Address, value: U256, input: Vec<u8>) -> RawTransaction {
        RawTransaction {
            hash: TxHash::ZERO,
            from: Address::ZERO,
            to: Some(to),
            value,
            gas_price: Some(50_000_000_000),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            input: Bytes::from(input),
        }
    }

    /// Calldata captured from a swapExactETHForTokens WETH → PEPE call
    fn eth_for_pepe_input() -> Vec<u8> {
        hex::decode(concat!(
            "7ff36ab5",
            "0000000000000000000000000000000000000000000000000000000000000001",
            "0000000000000000000000000000000000000000000000000000000000000080",
            "000000000000000000000000abcdef1234567890abcdef1234567890abcdef12",
            "0000000000000000000000000000000000000000000000000000000067a0b5cc",
            "0000000000000000000000000000000000000000000000000000000000000002",
            "000000000000000000000000c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
            "0000000000000000000000006982508145454ce325ddbe47a25d4ec3d2311933",
        ))
        .unwrap()
    }

    #[test]
    fn test_decode_swap_exact_eth_for_tokens() {
        let value = U256::from(1_500_000_000_000_000_000u128);
        let tx = raw_tx(UNISWAP_V2_ROUTER, value, eth_for_pepe_input());
        let decoded = decode(&tx, &Registry::mainnet()).unwrap();

        assert_eq!(decoded.method, SwapMethod::SwapExactEthForTokens);
        assert_eq!(decoded.amount_in, value);
        assert_eq!(decoded.amount_out_min, U256::from(1));
        assert_eq!(decoded.path, vec![WETH, PEPE]);
        assert_eq!(
            decoded.recipient,
            "0xabcdef1234567890abcdef1234567890abcdef12".parse::<Address>().unwrap()
        );
        assert_eq!(decoded.deadline, U256::from(0x67a0b5ccu64));
    }

    #[test]
    fn test_encoder_matches_captured_calldata() {
        let decoded = DecodedSwap {
            method: SwapMethod::SwapExactEthForTokens,
            amount_in: U256::ZERO,
            amount_out_min: U256::from(1),
            path: vec![WETH, PEPE],
            recipient: "0xabcdef1234567890abcdef1234567890abcdef12".parse().unwrap(),
            deadline: U256::from(0x67a0b5ccu64),
        };
        assert_eq!(encode_calldata(&decoded).to_vec(), eth_for_pepe_input());
    }

    #[test]
    fn test_eth_in_path_lengths() {
        let pool: Vec<Address> = (1u8..=6).map(Address::repeat_byte).collect();
        for n in 2..=6 {
            let path = &pool[..n];
            let input = encode_calldata(&swap(SwapMethod::SwapExactEthForTokens, U256::ZERO, U256::from(1), path));
            let decoded = decode_calldata(&input, U256::from(7)).unwrap();
            assert_eq!(decoded.path, path.to_vec());
            assert_eq!(decoded.token_in(), path[0]);
            assert_eq!(decoded.token_out(), path[n - 1]);
            assert_eq!(decoded.amount_in, U256::from(7));
        }
    }

    #[test]
    fn test_decode_token_in_uses_calldata_amount() {
        let amount_in = U256::from(100_500_000u64);
        let input = encode_calldata(&swap(SwapMethod::SwapExactTokensForEth, amount_in, U256::from(5), &[USDC, WETH]));
        // msg.value is ignored for token-in methods
        let decoded = decode_calldata(&input, U256::from(123)).unwrap();
        assert_eq!(decoded.method, SwapMethod::SwapExactTokensForEth);
        assert_eq!(decoded.amount_in, amount_in);
        assert_eq!(decoded.amount_out_min, U256::from(5));
        assert_eq!(decoded.recipient, Address::repeat_byte(0x11));
        assert_eq!(decoded.deadline, U256::from(99));
        assert_eq!(decoded.path, vec![USDC, WETH]);
    }

    #[test]
    fn test_decode_exact_output_reads_amount_in_max() {
        let input = encode_calldata(&swap(
            SwapMethod::SwapTokensForExactTokens,
            U256::from(2_000u64),
            U256::from(1_000u64),
            &[USDC, WETH, PEPE],
        ));
        // amountOut is the first head word, amountInMax the second
        assert_eq!(U256::from_be_slice(&input[4..36]), U256::from(1_000u64));

        let decoded = decode_calldata(&input, U256::ZERO).unwrap();
        assert_eq!(decoded.amount_out_min, U256::from(1_000u64));
        assert_eq!(decoded.amount_in, U256::from(2_000u64));
        assert_eq!(decoded.path.len(), 3);
    }

    #[test]
    fn test_amount_beyond_u64() {
        let huge = U256::MAX - U256::from(1);
        let input = encode_calldata(&swap(SwapMethod::SwapExactTokensForTokens, huge, U256::ZERO, &[USDC, PEPE]));
        assert_eq!(decode_calldata(&input, U256::ZERO).unwrap().amount_in, huge);
    }

    #[test]
    fn test_non_router_returns_none() {
        let tx = raw_tx(Address::ZERO, U256::from(1), eth_for_pepe_input());
        assert!(decode(&tx, &Registry::mainnet()).is_none());

        let mut no_to = raw_tx(UNISWAP_V2_ROUTER, U256::from(1), eth_for_pepe_input());
        no_to.to = None;
        assert!(decode(&no_to, &Registry::mainnet()).is_none());
    }

    #[test]
    fn test_router_match_ignores_case() {
        let to: Address = "0x7A250D5630B4CF539739DF2C5DACB4C659F2488D".parse().unwrap();
        let tx = raw_tx(to, U256::from(1), eth_for_pepe_input());
        assert!(decode(&tx, &Registry::mainnet()).is_some());
    }

    #[test]
    fn test_empty_and_short_input() {
        let reg = Registry::mainnet();
        assert!(decode(&raw_tx(UNISWAP_V2_ROUTER, U256::ZERO, vec![]), &reg).is_none());
        assert!(decode(&raw_tx(UNISWAP_V2_ROUTER, U256::ZERO, vec![0x7f, 0xf3, 0x6a]), &reg).is_none());
        // Selector only, no parameters
        assert!(decode(&raw_tx(UNISWAP_V2_ROUTER, U256::ZERO, vec![0x7f, 0xf3, 0x6a, 0xb5]), &reg).is_none());
    }

    #[test]
    fn test_unknown_selector() {
        let mut input = eth_for_pepe_input();
        input[..4].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        assert!(decode_calldata(&input, U256::ZERO).is_none());
    }

    #[test]
    fn test_offset_out_of_range() {
        let mut input = eth_for_pepe_input();
        // path offset word → 0x1000
        input[4 + 32 + 30] = 0x10;
        input[4 + 32 + 31] = 0x00;
        assert!(decode_calldata(&input, U256::ZERO).is_none());

        // offset larger than usize
        let mut input = eth_for_pepe_input();
        input[4 + 32] = 0xff;
        assert!(decode_calldata(&input, U256::ZERO).is_none());
    }

    #[test]
    fn test_length_out_of_range() {
        let mut input = eth_for_pepe_input();
        // path length word → 3, only two addresses present
        input[4 + 4 * 32 + 31] = 0x03;
        assert!(decode_calldata(&input, U256::ZERO).is_none());

        let mut input = eth_for_pepe_input();
        input[4 + 4 * 32] = 0xff;
        assert!(decode_calldata(&input, U256::ZERO).is_none());
    }

    #[test]
    fn test_truncated_path() {
        let mut input = eth_for_pepe_input();
        input.truncate(input.len() - 10);
        assert!(decode_calldata(&input, U256::ZERO).is_none());
    }

    #[test]
    fn test_single_hop_path_rejected() {
        let input = encode_calldata(&swap(SwapMethod::SwapExactEthForTokens, U256::ZERO, U256::from(1), &[WETH]));
        assert!(decode_calldata(&input, U256::ZERO).is_none());
    }

    #[test]
    fn test_path_offset_honored() {
        // Tail placed after an extra padding word: offset 0xa0 instead of 0x80
        let mut input = eth_for_pepe_input();
        input[4 + 32 + 31] = 0xa0;
        input.splice(4 + 4 * 32..4 + 4 * 32, [0xeeu8; 32]);
        let decoded = decode_calldata(&input, U256::ZERO).unwrap();
        assert_eq!(decoded.path, vec![WETH, PEPE]);
    }

    #[test]
    fn test_selector_helpers() {
        assert_eq!(selector_hex(&[0x7f, 0xf3, 0x6a, 0xb5, 0x00]), "0x7ff36ab5");
        assert_eq!(selector_hex(&[0x7f, 0xf3]), "0x????");
        assert!(is_swap_method([0x7f, 0xf3, 0x6a, 0xb5]));
        assert!(!is_swap_method([0x12, 0x34, 0x56, 0x78]));
        assert_eq!(method_name([0x7f, 0xf3, 0x6a, 0xb5]), Some("swapExactETHForTokens"));
        assert_eq!(method_name([0x12, 0x34, 0x56, 0x78]), None);
    }
}
