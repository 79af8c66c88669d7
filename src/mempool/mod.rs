//! Mempool Watcher Module
//!
//! Purpose:
//!     Watch pending transactions sent to known DEX routers, decode their
//!     swap calldata and classify each swap.
//!
//! Architecture:
//!     types.rs      : SwapMethod table, DecodedSwap, listener state/stats/events
//!     decoder.rs    : Calldata → DecodedSwap (V2-style router functions)
//!     classifier.rs : DecodedSwap → ClassifiedTx (direction, pair, suspicion)
//!     feed.rs       : PendingTxFeed / FeedConnector traits + alloy WS feed
//!     demo.rs       : Synthetic feed for running without a node
//!     listener.rs   : Subscription state machine, reconnect, bounded fetches
//!     error.rs      : FeedError, ListenerError
//!
//! Usage:
//!     The binary builds a `MempoolListener` over a connector and passes a
//!     handler to `initialize`; fatal events arrive on the returned channel.

pub mod classifier;
pub mod decoder;
pub mod demo;
pub mod error;
pub mod feed;
pub mod listener;
pub mod types;

pub use classifier::{classify, ClassifierConfig};
pub use decoder::{decode, decode_calldata, is_swap_method, method_name, selector_hex};
pub use demo::DemoFeedConnector;
pub use error::{FeedError, ListenerError};
pub use feed::{FeedConnector, PendingTxFeed, WsFeedConnector};
pub use listener::{ListenerConfig, MempoolListener, ReconnectPolicy, Sleeper, TokioSleeper};
pub use types::{DecodedSwap, ListenerEvent, ListenerState, ListenerStats, SwapMethod};
