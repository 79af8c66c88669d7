//! Mempool Swap Watcher Library
//!
//! Decodes pending DEX router swaps from an Ethereum mempool feed, classifies
//! them and tracks feed health.

pub mod config;
pub mod mempool;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use config::WatcherConfig;
pub use mempool::{ClassifierConfig, ListenerConfig, ListenerEvent, MempoolListener};
pub use registry::Registry;
pub use types::{ClassifiedTx, Direction, RawTransaction, TokenMetadata};
