//! Demo Feed
//!
//! Purpose:
//!     Synthetic pending-transaction source for running the watcher without a
//!     node. Emits a deterministic mix of router swaps, plain transfers and
//!     garbage calldata so every branch of the pipeline shows up in the logs.
//!
//! Dependencies:
//!     - tokio / tokio-stream (generator task, hash stream)
//!     - tokio-util (CancellationToken stops the generator)
//!
//! Notes:
//!     Transactions are derived from a counter via keccak256, so a run is
//!     reproducible. Each fetch removes the transaction from the backlog, and
//!     the backlog drops its oldest entries once it holds `BACKLOG_CAPACITY`.

use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::registry::Registry;
use crate::types::RawTransaction;

use super::decoder::encode_calldata;
use super::error::FeedError;
use super::feed::{FeedConnector, HashStream, PendingTxFeed};
use super::types::{DecodedSwap, SwapMethod};

const GWEI: u128 = 1_000_000_000;
const HASH_CHANNEL_CAPACITY: usize = 256;
/// Unfetched transactions kept for lookup; the oldest are evicted past this
const BACKLOG_CAPACITY: usize = 1_024;

/// Opens demo feeds. The counter is shared so hashes stay unique across
/// reconnects.
pub struct DemoFeedConnector {
    interval: Duration,
    routers: Vec<Address>,
    tokens: Vec<(Address, u8)>,
    wrapped_native: Address,
    counter: Arc<AtomicU64>,
}

impl DemoFeedConnector {
    pub fn new(registry: &Registry, interval: Duration) -> Self {
        let mut routers: Vec<Address> = registry.routers().map(|(addr, _)| *addr).collect();
        routers.sort();

        let wrapped_native = registry.wrapped_native();
        let mut tokens: Vec<(Address, u8)> = registry
            .tokens()
            .filter(|meta| meta.address != wrapped_native)
            .map(|meta| (meta.address, meta.decimals))
            .collect();
        tokens.sort();

        Self {
            interval,
            routers,
            tokens,
            wrapped_native,
            counter: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl FeedConnector for DemoFeedConnector {
    async fn connect(&self) -> Result<Arc<dyn PendingTxFeed>, FeedError> {
        if self.routers.is_empty() {
            return Err(FeedError::Connect("demo feed needs at least one router".to_string()));
        }
        let generator = TxGenerator {
            routers: self.routers.clone(),
            tokens: self.tokens.clone(),
            wrapped_native: self.wrapped_native,
        };
        Ok(Arc::new(DemoFeed {
            interval: self.interval,
            generator: Arc::new(generator),
            counter: self.counter.clone(),
            backlog: Arc::new(Mutex::new(Backlog::new(BACKLOG_CAPACITY))),
            closed: CancellationToken::new(),
            subscription: Mutex::new(None),
        }))
    }
}

pub struct DemoFeed {
    interval: Duration,
    generator: Arc<TxGenerator>,
    counter: Arc<AtomicU64>,
    backlog: Arc<Mutex<Backlog>>,
    /// Cancelled on close; parent of every subscription token
    closed: CancellationToken,
    subscription: Mutex<Option<CancellationToken>>,
}

#[async_trait]
impl PendingTxFeed for DemoFeed {
    async fn subscribe_pending_transactions(&self) -> Result<HashStream, FeedError> {
        if self.closed.is_cancelled() {
            return Err(FeedError::Closed);
        }

        let token = self.closed.child_token();
        if let Ok(mut slot) = self.subscription.lock() {
            if let Some(previous) = slot.replace(token.clone()) {
                previous.cancel();
            }
        }

        let (tx, rx) = mpsc::channel(HASH_CHANNEL_CAPACITY);
        let interval = self.interval;
        let generator = self.generator.clone();
        let counter = self.counter.clone();
        let backlog = self.backlog.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let n = counter.fetch_add(1, Ordering::Relaxed);
                let raw = generator.generate(n);
                let hash = raw.hash;
                match backlog.lock() {
                    Ok(mut pending) => pending.insert(raw),
                    Err(_) => break,
                }
                if tx.send(hash).await.is_err() {
                    break;
                }
            }
            debug!("Demo generator stopped");
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn get_transaction_by_hash(&self, hash: TxHash) -> Result<Option<RawTransaction>, FeedError> {
        if self.closed.is_cancelled() {
            return Err(FeedError::Closed);
        }
        let mut pending = self
            .backlog
            .lock()
            .map_err(|_| FeedError::Request("demo backlog poisoned".to_string()))?;
        Ok(pending.take(&hash))
    }

    async fn unsubscribe(&self) -> Result<(), FeedError> {
        if let Ok(mut slot) = self.subscription.lock() {
            if let Some(token) = slot.take() {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), FeedError> {
        self.closed.cancel();
        if let Ok(mut pending) = self.backlog.lock() {
            pending.clear();
        }
        Ok(())
    }
}

/// Generated transactions awaiting a fetch, bounded by insertion order.
/// Hashes whose fetch timed out or never came are evicted oldest first.
struct Backlog {
    txs: HashMap<TxHash, RawTransaction>,
    order: VecDeque<TxHash>,
    capacity: usize,
}

impl Backlog {
    fn new(capacity: usize) -> Self {
        Self {
            txs: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, tx: RawTransaction) {
        self.order.push_back(tx.hash);
        self.txs.insert(tx.hash, tx);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.txs.remove(&oldest);
            }
        }
    }

    fn take(&mut self, hash: &TxHash) -> Option<RawTransaction> {
        self.txs.remove(hash)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.txs.len()
    }

    fn clear(&mut self) {
        self.txs.clear();
        self.order.clear();
    }
}

// ── Transaction generation ──────────────────────────────────────────

struct TxGenerator {
    routers: Vec<Address>,
    tokens: Vec<(Address, u8)>,
    wrapped_native: Address,
}

impl TxGenerator {
    /// Transaction number `n`. Slots 0-4 are swaps at normal gas, 5 is a plain
    /// transfer, 6 hits a router with an unknown selector, 7 is a high-gas swap.
    fn generate(&self, n: u64) -> RawTransaction {
        let seed = keccak256(n.to_be_bytes());
        let hash = seed;
        let b = seed.as_slice();

        let router = self.routers[b[0] as usize % self.routers.len()];
        let from = Address::from_slice(&keccak256(seed.as_slice())[12..]);
        let mut gas_gwei = 10 + (b[1] % 80) as u128;

        let (to, value, input) = match n % 8 {
            5 => {
                let to = Address::from_slice(&b[12..]);
                let value = U256::from(b[2] as u64 + 1) * U256::from(10u64).pow(U256::from(16u64));
                (to, value, Bytes::new())
            }
            6 => {
                let mut input = vec![0xa9, 0x05, 0x9c, 0xbb];
                input.extend_from_slice(&b[..]);
                (router, U256::ZERO, Bytes::from(input))
            }
            slot => {
                if slot == 7 {
                    gas_gwei = 150 + (b[1] % 100) as u128;
                }
                let swap = self.swap(b);
                let value = if swap.method.is_eth_in() { swap.amount_in } else { U256::ZERO };
                (router, value, encode_calldata(&swap))
            }
        };

        // Alternate legacy and EIP-1559 fee fields
        let (gas_price, max_fee_per_gas, max_priority_fee_per_gas) = if n % 2 == 0 {
            (Some(gas_gwei * GWEI), None, None)
        } else {
            (None, Some(gas_gwei * GWEI), Some((1 + (b[3] % 3) as u128) * GWEI))
        };

        RawTransaction {
            hash,
            from,
            to: Some(to),
            value,
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            input,
        }
    }

    fn swap(&self, b: &[u8]) -> DecodedSwap {
        let method = SwapMethod::ALL[b[4] as usize % SwapMethod::ALL.len()];
        let (token, decimals) = self.token(b[5]);
        let (other, _) = self.token(b[6].wrapping_add(1));

        let path = if method.is_eth_in() {
            vec![self.wrapped_native, token]
        } else if method.is_eth_out() {
            vec![token, self.wrapped_native]
        } else if b[7] % 3 == 0 && other != token {
            vec![token, self.wrapped_native, other]
        } else if other != token {
            vec![token, other]
        } else {
            vec![token, self.wrapped_native]
        };

        // Native amounts between 0.25 and 16 ETH so some cross the default threshold
        let amount_in = if method.is_eth_in() {
            U256::from(b[8] as u64 % 64 + 1) * U256::from(250_000_000_000_000_000u64)
        } else {
            U256::from(b[8] as u64 + 1) * U256::from(10u64).pow(U256::from(decimals))
        };

        DecodedSwap {
            method,
            amount_in,
            amount_out_min: U256::from(b[9] as u64 + 1),
            path,
            recipient: Address::from_slice(&b[..20]),
            deadline: U256::from(1_700_000_000u64 + b[10] as u64 * 60),
        }
    }

    fn token(&self, pick: u8) -> (Address, u8) {
        if self.tokens.is_empty() {
            return (self.wrapped_native, 18);
        }
        self.tokens[pick as usize % self.tokens.len()]
    }
}
