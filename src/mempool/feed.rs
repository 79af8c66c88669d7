//! Upstream Feed Capability
//!
//! Purpose:
//!     Abstracts the provider's pending-transaction subscription so the
//!     listener can be driven by a live WebSocket node, the demo generator,
//!     or a scripted feed in tests.
//!
//! Dependencies:
//!     - alloy (WS provider, eth_subscribe newPendingTransactions)
//!     - async-trait, futures (boxed hash stream)
//!
//! Notes:
//!     A `FeedConnector` opens a fresh feed; the listener calls it once at
//!     startup and again on every reconnect attempt.

use alloy::consensus::Transaction as ConsensusTx;
use alloy::network::TransactionResponse;
use alloy::primitives::{TxHash, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::Transaction;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::types::RawTransaction;

use super::error::FeedError;

/// Stream of pending transaction hashes; ends when the connection is lost
pub type HashStream = BoxStream<'static, TxHash>;

/// One open connection to a pending-transaction source
#[async_trait]
pub trait PendingTxFeed: Send + Sync {
    async fn subscribe_pending_transactions(&self) -> Result<HashStream, FeedError>;

    /// Ok(None) when the node no longer knows the hash (mined or dropped)
    async fn get_transaction_by_hash(&self, hash: TxHash) -> Result<Option<RawTransaction>, FeedError>;

    async fn unsubscribe(&self) -> Result<(), FeedError>;

    async fn close(&self) -> Result<(), FeedError>;
}

/// Opens feeds
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn PendingTxFeed>, FeedError>;
}

// ── alloy WebSocket implementation ──────────────────────────────────

/// Connects to an Ethereum node over WebSocket
pub struct WsFeedConnector {
    ws_url: String,
}

impl WsFeedConnector {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into() }
    }
}

#[async_trait]
impl FeedConnector for WsFeedConnector {
    async fn connect(&self) -> Result<Arc<dyn PendingTxFeed>, FeedError> {
        let ws = WsConnect::new(self.ws_url.clone());
        let provider = ProviderBuilder::new()
            .connect_ws(ws)
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;

        let block = provider
            .get_block_number()
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        info!("Connected to WS node (block {})", block);

        Ok(Arc::new(WsFeed::new(provider.erased())))
    }
}

/// Pending-transaction feed backed by an alloy WS provider
pub struct WsFeed {
    /// None once closed
    provider: Mutex<Option<DynProvider>>,
    subscription_id: Mutex<Option<B256>>,
}

impl WsFeed {
    pub fn new(provider: DynProvider) -> Self {
        Self {
            provider: Mutex::new(Some(provider)),
            subscription_id: Mutex::new(None),
        }
    }

    async fn provider(&self) -> Result<DynProvider, FeedError> {
        self.provider.lock().await.clone().ok_or(FeedError::Closed)
    }
}

#[async_trait]
impl PendingTxFeed for WsFeed {
    async fn subscribe_pending_transactions(&self) -> Result<HashStream, FeedError> {
        let provider = self.provider().await?;
        let sub = provider
            .subscribe_pending_transactions()
            .await
            .map_err(|e| FeedError::Subscribe(e.to_string()))?;

        *self.subscription_id.lock().await = Some(*sub.local_id());
        Ok(sub.into_stream().boxed())
    }

    async fn get_transaction_by_hash(&self, hash: TxHash) -> Result<Option<RawTransaction>, FeedError> {
        let provider = self.provider().await?;
        let tx = provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;
        Ok(tx.as_ref().map(to_raw_transaction))
    }

    async fn unsubscribe(&self) -> Result<(), FeedError> {
        let Some(id) = self.subscription_id.lock().await.take() else {
            return Ok(());
        };
        let provider = self.provider().await?;
        provider
            .unsubscribe(id)
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;
        debug!("Unsubscribed {:?}", id);
        Ok(())
    }

    async fn close(&self) -> Result<(), FeedError> {
        // Dropping the last provider handle shuts the WS backend down
        self.provider.lock().await.take();
        Ok(())
    }
}

/// Map an RPC transaction onto the fields the watcher reads
pub fn to_raw_transaction(tx: &Transaction) -> RawTransaction {
    let gas_price = ConsensusTx::gas_price(tx);
    RawTransaction {
        hash: TransactionResponse::tx_hash(tx),
        from: TransactionResponse::from(tx),
        to: ConsensusTx::to(tx),
        value: ConsensusTx::value(tx),
        gas_price,
        max_fee_per_gas: match gas_price {
            Some(_) => None,
            None => Some(ConsensusTx::max_fee_per_gas(tx)),
        },
        max_priority_fee_per_gas: ConsensusTx::max_priority_fee_per_gas(tx),
        input: ConsensusTx::input(tx).clone(),
    }
}
