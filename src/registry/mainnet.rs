//! Built-in Ethereum mainnet table: monitored V2-style routers and well-known tokens.

use alloy::primitives::{address, Address};

// ---------------------------------------------------------------------------
// Monitored routers
// ---------------------------------------------------------------------------

pub const UNISWAP_V2_ROUTER: Address = address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D");
pub const SUSHISWAP_ROUTER: Address = address!("d9e1cE17f2641f24aE83637ab66a2cca9C378B9F");

pub const ROUTERS: [(Address, &str); 2] = [
    (UNISWAP_V2_ROUTER, "UniswapV2"),
    (SUSHISWAP_ROUTER, "SushiSwap"),
];

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

pub const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const USDT: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
pub const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
pub const WBTC: Address = address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599");
pub const PEPE: Address = address!("6982508145454Ce325dDbE47a25d4ec3d2311933");
pub const SHIB: Address = address!("95aD61b0a150d79219dCF64E1E6Cc01f0B64C4cE");
pub const LINK: Address = address!("514910771AF9Ca656af840dff83E8264EcF986CA");
pub const UNI: Address = address!("1f9840a85d5aF5bf1D1762F925BDADdC4201F984");

/// (address, symbol, decimals)
pub const TOKENS: [(Address, &str, u8); 9] = [
    (WETH, "WETH", 18),
    (USDC, "USDC", 6),
    (USDT, "USDT", 6),
    (DAI, "DAI", 18),
    (WBTC, "WBTC", 8),
    (PEPE, "PEPE", 18),
    (SHIB, "SHIB", 18),
    (LINK, "LINK", 18),
    (UNI, "UNI", 18),
];
