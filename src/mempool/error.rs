//! Error types for the feed capability and the listener.
//!
//! Decoder and classifier have no error type: malformed calldata is a normal
//! outcome and surfaces as `None`.

use thiserror::Error;

/// Failure reported by an upstream pending-transaction feed
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("subscription failed: {0}")]
    Subscribe(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("feed closed")]
    Closed,
}

/// Conditions the listener surfaces to its owner
#[derive(Debug, Clone, Error)]
pub enum ListenerError {
    #[error("connection failed: {0}")]
    Connect(#[source] FeedError),

    #[error("subscription failed: {0}")]
    Subscribe(#[source] FeedError),

    #[error("listener is already running")]
    AlreadyRunning,

    #[error("listener shut down before the feed was ready")]
    Cancelled,

    #[error("reconnect attempts exhausted after {attempts} tries: {last_error}")]
    ReconnectsExhausted { attempts: u32, last_error: String },
}
