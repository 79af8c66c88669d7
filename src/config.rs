//! Configuration management
//!
//! Purpose:
//!     Watcher settings from built-in defaults, an optional TOML file and the
//!     environment (`.env` loaded by the binary). Later sources win:
//!     defaults → TOML → environment.
//!
//! Dependencies:
//!     - toml + serde (file overlay)
//!     - rust_decimal (large-trade threshold in ETH)
//!
//! Environment keys:
//!     WS_URL, GAS_PRICE_THRESHOLD_GWEI, LARGE_TRADE_THRESHOLD_ETH,
//!     MAX_RECONNECT_ATTEMPTS, RECONNECT_INITIAL_DELAY_MS, RECONNECT_MAX_DELAY_MS,
//!     MAX_CONCURRENT_FETCHES, FETCH_TIMEOUT_MS, STATS_INTERVAL_SECS,
//!     REGISTRY_FILE, DEMO_MODE, DEMO_INTERVAL_MS

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::mempool::classifier::ClassifierConfig;
use crate::mempool::listener::{ListenerConfig, ReconnectPolicy};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Node WebSocket endpoint; required unless running the demo feed
    pub ws_url: Option<String>,
    pub gas_price_threshold_gwei: f64,
    pub large_trade_threshold_eth: Decimal,
    pub max_reconnect_attempts: u32,
    pub reconnect_initial_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub max_concurrent_fetches: usize,
    pub fetch_timeout_ms: u64,
    pub stats_interval_secs: u64,
    /// JSON token/router table; the built-in mainnet table when unset
    pub registry_file: Option<String>,
    pub demo_mode: bool,
    pub demo_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            gas_price_threshold_gwei: 100.0,
            large_trade_threshold_eth: Decimal::from(10),
            max_reconnect_attempts: 10,
            reconnect_initial_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            max_concurrent_fetches: 32,
            fetch_timeout_ms: 5_000,
            stats_interval_secs: 30,
            registry_file: None,
            demo_mode: false,
            demo_interval_ms: 500,
        }
    }
}

impl WatcherConfig {
    /// Defaults, then `toml_path` if given, then the process environment
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut config = match toml_path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Overlay every key `lookup` returns a value for
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WS_URL").filter(|u| !u.trim().is_empty()) {
            self.ws_url = Some(url.trim().to_string());
        }
        if let Some(path) = lookup("REGISTRY_FILE").filter(|p| !p.trim().is_empty()) {
            self.registry_file = Some(path.trim().to_string());
        }

        overlay(&lookup, "GAS_PRICE_THRESHOLD_GWEI", &mut self.gas_price_threshold_gwei)?;
        overlay(&lookup, "LARGE_TRADE_THRESHOLD_ETH", &mut self.large_trade_threshold_eth)?;
        overlay(&lookup, "MAX_RECONNECT_ATTEMPTS", &mut self.max_reconnect_attempts)?;
        overlay(&lookup, "RECONNECT_INITIAL_DELAY_MS", &mut self.reconnect_initial_delay_ms)?;
        overlay(&lookup, "RECONNECT_MAX_DELAY_MS", &mut self.reconnect_max_delay_ms)?;
        overlay(&lookup, "MAX_CONCURRENT_FETCHES", &mut self.max_concurrent_fetches)?;
        overlay(&lookup, "FETCH_TIMEOUT_MS", &mut self.fetch_timeout_ms)?;
        overlay(&lookup, "STATS_INTERVAL_SECS", &mut self.stats_interval_secs)?;
        overlay(&lookup, "DEMO_INTERVAL_MS", &mut self.demo_interval_ms)?;

        if let Some(raw) = lookup("DEMO_MODE") {
            self.demo_mode = parse_bool(&raw).with_context(|| format!("DEMO_MODE: invalid value '{}'", raw))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.demo_mode && self.ws_url.is_none() {
            bail!("WS_URL not set (or enable DEMO_MODE)");
        }
        if !self.gas_price_threshold_gwei.is_finite() || self.gas_price_threshold_gwei < 0.0 {
            bail!("GAS_PRICE_THRESHOLD_GWEI must be a non-negative number");
        }
        if self.large_trade_threshold_eth.is_sign_negative() {
            bail!("LARGE_TRADE_THRESHOLD_ETH must be non-negative");
        }
        if self.max_concurrent_fetches == 0 {
            bail!("MAX_CONCURRENT_FETCHES must be at least 1");
        }
        if self.reconnect_initial_delay_ms > self.reconnect_max_delay_ms {
            bail!(
                "RECONNECT_INITIAL_DELAY_MS ({}) exceeds RECONNECT_MAX_DELAY_MS ({})",
                self.reconnect_initial_delay_ms,
                self.reconnect_max_delay_ms
            );
        }
        if self.stats_interval_secs == 0 {
            bail!("STATS_INTERVAL_SECS must be at least 1");
        }
        Ok(())
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig::new(self.gas_price_threshold_gwei, self.large_trade_threshold_eth)
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(self.reconnect_initial_delay_ms),
                max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
                max_attempts: self.max_reconnect_attempts,
            },
            max_concurrent_fetches: self.max_concurrent_fetches,
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
        }
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn demo_interval(&self) -> Duration {
        Duration::from_millis(self.demo_interval_ms)
    }

    /// Effective settings, with the WS URL cut back to its host
    pub fn log_summary(&self) {
        info!("Configuration:");
        match (&self.ws_url, self.demo_mode) {
            (_, true) => info!("  Feed: demo ({}ms interval)", self.demo_interval_ms),
            (Some(url), false) => info!("  Feed: {}", redact_url(url)),
            (None, false) => info!("  Feed: <unset>"),
        }
        info!("  Gas threshold: {} gwei", self.gas_price_threshold_gwei);
        info!("  Large trade threshold: {} ETH", self.large_trade_threshold_eth);
        info!(
            "  Reconnect: {} attempts, {}ms → {}ms backoff",
            self.max_reconnect_attempts, self.reconnect_initial_delay_ms, self.reconnect_max_delay_ms
        );
        info!(
            "  Fetch: {} concurrent, {}ms timeout",
            self.max_concurrent_fetches, self.fetch_timeout_ms
        );
        info!("  Stats every {}s", self.stats_interval_secs);
        info!(
            "  Registry: {}",
            self.registry_file.as_deref().unwrap_or("built-in mainnet table")
        );
    }
}

fn overlay<T, F>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}: invalid value '{}': {}", key, raw, e))?;
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected true/false, got '{}'", other),
    }
}

/// Keep scheme and host; API keys usually live in the path or userinfo
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return "***".to_string();
    };
    let authority = rest.split('/').next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or(authority);
    if rest.len() > authority.len() || host.len() < authority.len() {
        format!("{}://{}/***", scheme, host)
    } else {
        format!("{}://{}", scheme, host)
    }
}
