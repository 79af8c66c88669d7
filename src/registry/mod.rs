//! Token / Router Registry
//!
//! Static lookup from address to token metadata and router identity.
//! Loaded once at startup, either from the built-in mainnet table or from a
//! JSON file prepared by the operator. No interior mutability: share it
//! behind an `Arc`.
//!
//! Config file format (REGISTRY_FILE):
//!     {
//!       "wrapped_native": "0xC02a...",
//!       "tokens":  [{ "address": "0x...", "symbol": "WETH", "decimals": 18 }],
//!       "routers": [{ "address": "0x...", "name": "UniswapV2" }]
//!     }

pub mod mainnet;

use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::types::TokenMetadata;

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RegistryFile {
    pub wrapped_native: String,
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
    #[serde(default)]
    pub routers: Vec<RouterEntry>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenEntry {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RouterEntry {
    pub address: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Address → token metadata and address → router name.
/// `Address` equality is byte-wise, so lookups are case-insensitive by construction.
#[derive(Debug, Clone)]
pub struct Registry {
    tokens: HashMap<Address, TokenMetadata>,
    routers: HashMap<Address, String>,
    wrapped_native: Address,
}

impl Registry {
    pub fn new(
        tokens: impl IntoIterator<Item = TokenMetadata>,
        routers: impl IntoIterator<Item = (Address, String)>,
        wrapped_native: Address,
    ) -> Self {
        Self {
            tokens: tokens.into_iter().map(|t| (t.address, t)).collect(),
            routers: routers.into_iter().collect(),
            wrapped_native,
        }
    }

    /// Built-in Ethereum mainnet table
    pub fn mainnet() -> Self {
        Self::new(
            mainnet::TOKENS
                .iter()
                .map(|(addr, symbol, decimals)| TokenMetadata::new(*addr, *symbol, *decimals)),
            mainnet::ROUTERS
                .iter()
                .map(|(addr, name)| (*addr, name.to_string())),
            mainnet::WETH,
        )
    }

    /// Load from a JSON registry file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry file: {}", path.display()))?;
        let file: RegistryFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse registry file: {}", path.display()))?;
        let registry = Self::from_file(file)?;
        info!(
            "Registry loaded from {}: {} tokens, {} routers",
            path.display(),
            registry.token_count(),
            registry.router_count()
        );
        Ok(registry)
    }

    /// Build from an already-parsed registry file. Invalid entries are skipped
    /// with a warning; an invalid wrapped-native address is an error.
    pub fn from_file(file: RegistryFile) -> Result<Self> {
        let wrapped_native = parse_address(&file.wrapped_native)
            .with_context(|| format!("Invalid wrapped_native address: {}", file.wrapped_native))?;

        let mut tokens = Vec::with_capacity(file.tokens.len());
        for entry in &file.tokens {
            match parse_address(&entry.address) {
                Some(addr) => tokens.push(TokenMetadata::new(addr, entry.symbol.clone(), entry.decimals)),
                None => warn!("Invalid token address '{}' ({}) — skipping", entry.address, entry.symbol),
            }
        }

        let mut routers = Vec::with_capacity(file.routers.len());
        for entry in &file.routers {
            match parse_address(&entry.address) {
                Some(addr) => routers.push((addr, entry.name.clone())),
                None => warn!("Invalid router address '{}' ({}) — skipping", entry.address, entry.name),
            }
        }

        if routers.is_empty() {
            bail!("Registry has no valid router addresses — nothing to monitor");
        }

        Ok(Self::new(tokens, routers, wrapped_native))
    }

    /// Metadata for `address`, or the UNKNOWN placeholder
    pub fn token_metadata(&self, address: Address) -> TokenMetadata {
        match self.tokens.get(&address) {
            Some(meta) => meta.clone(),
            None => {
                debug!("Unknown token {:?}", address);
                TokenMetadata::unknown(address)
            }
        }
    }

    pub fn token_symbol(&self, address: Address) -> &str {
        self.tokens
            .get(&address)
            .map(|t| t.symbol.as_str())
            .unwrap_or(crate::types::UNKNOWN_SYMBOL)
    }

    pub fn is_monitored_router(&self, address: Address) -> bool {
        self.routers.contains_key(&address)
    }

    pub fn router_name(&self, address: Address) -> Option<&str> {
        self.routers.get(&address).map(String::as_str)
    }

    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    pub fn is_wrapped_native(&self, address: Address) -> bool {
        address == self.wrapped_native
    }

    /// Direction-independent pair label: addresses are ordered before symbol
    /// lookup, so `create_pair(a, b) == create_pair(b, a)`.
    pub fn create_pair(&self, a: Address, b: Address) -> String {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        format!("{}/{}", self.token_symbol(first), self.token_symbol(second))
    }

    /// Format a raw amount using the decimals registered for `token`
    pub fn format_token_amount(&self, raw: U256, token: Address) -> String {
        let decimals = self
            .tokens
            .get(&token)
            .map(|t| t.decimals)
            .unwrap_or(crate::types::DEFAULT_DECIMALS);
        format_units(raw, decimals)
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn router_count(&self) -> usize {
        self.routers.len()
    }

    pub fn routers(&self) -> impl Iterator<Item = (&Address, &String)> {
        self.routers.iter()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenMetadata> {
        self.tokens.values()
    }
}

/// Parse a hex address, accepting any letter case
pub fn parse_address(s: &str) -> Option<Address> {
    s.trim().to_lowercase().parse().ok()
}

/// `raw / 10^decimals` rendered exactly, trailing fractional zeros trimmed.
/// Integer arithmetic only: 18-decimal values never pass through f64.
pub fn format_units(raw: U256, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }

    // 10^78 overflows U256; every U256 is then below the divisor
    let (whole, frac) = match U256::from(10u8).checked_pow(U256::from(decimals)) {
        Some(divisor) => (raw / divisor, raw % divisor),
        None => (U256::ZERO, raw),
    };

    if frac.is_zero() {
        return whole.to_string();
    }

    let frac_str = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}
