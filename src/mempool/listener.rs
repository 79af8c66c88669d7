//! Mempool Listener
//!
//! Purpose:
//!     Owns the pending-transaction subscription. Pulls hashes from the feed,
//!     fetches bodies on bounded worker tasks, runs router transactions through
//!     decode + classify and hands the result to the owner's handler.
//!
//! Dependencies:
//!     - tokio (tasks, JoinSet, Semaphore, mpsc, timeout)
//!     - tokio-util (CancellationToken, the only cancellation path)
//!     - chrono (window timestamp in stats snapshots)
//!
//! State machine:
//!     Disconnected → Connecting → Subscribed → Reconnecting → Subscribed | Disconnected
//!
//! Notes:
//!     Initial connect failures go back to the caller and are not retried.
//!     Stream loss triggers exponential backoff; when attempts run out a single
//!     `ListenerEvent::Fatal` is sent and the listener settles Disconnected.

use alloy::primitives::TxHash;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::registry::Registry;
use crate::types::ClassifiedTx;

use super::classifier::{classify, ClassifierConfig};
use super::decoder::{decode, selector_hex};
use super::error::ListenerError;
use super::feed::{FeedConnector, HashStream, PendingTxFeed};
use super::types::{ListenerEvent, ListenerState, ListenerStats};

/// Rolling throughput window
const STATS_WINDOW: Duration = Duration::from_secs(60);

/// Callback invoked once per classified swap
pub type SwapHandler = Arc<dyn Fn(ClassifiedTx) + Send + Sync>;

// ── Configuration ───────────────────────────────────────────────────

/// Exponential backoff for re-subscribing after the stream drops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-based): initial * 2^(attempt-1), capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub reconnect: ReconnectPolicy,
    /// Upper bound on concurrent fetch+decode tasks
    pub max_concurrent_fetches: usize,
    pub fetch_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            max_concurrent_fetches: 32,
            fetch_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Backoff waits go through this so tests can observe them without sleeping
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ── Shared state ────────────────────────────────────────────────────

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct StatsInner {
    total_received: u64,
    total_decoded: u64,
    reconnect_attempts: u64,
    window_start: DateTime<Utc>,
    window_started_at: Instant,
    window_count: u64,
}

impl StatsInner {
    fn new() -> Self {
        Self {
            total_received: 0,
            total_decoded: 0,
            reconnect_attempts: 0,
            window_start: Utc::now(),
            window_started_at: Instant::now(),
            window_count: 0,
        }
    }

    fn reset_window(&mut self) {
        self.window_start = Utc::now();
        self.window_started_at = Instant::now();
        self.window_count = 0;
    }

    fn record_decoded(&mut self) {
        self.total_decoded += 1;
        if self.window_started_at.elapsed() >= STATS_WINDOW {
            self.reset_window();
        }
        self.window_count += 1;
    }

    fn snapshot(&self, connected: bool) -> ListenerStats {
        let elapsed_secs = self.window_started_at.elapsed().as_secs().max(1);
        ListenerStats {
            connected,
            total_transactions_received: self.total_received,
            total_transactions_decoded: self.total_decoded,
            reconnect_attempts: self.reconnect_attempts,
            window_start: self.window_start,
            window_count: self.window_count,
            transactions_per_minute: self.window_count as f64 * 60.0 / elapsed_secs as f64,
        }
    }
}

struct Shared {
    state: Mutex<ListenerState>,
    stats: Mutex<StatsInner>,
    /// Feed currently subscribed, closed by shutdown
    feed: Mutex<Option<Arc<dyn PendingTxFeed>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(ListenerState::Disconnected),
            stats: Mutex::new(StatsInner::new()),
            feed: Mutex::new(None),
        }
    }

    fn state(&self) -> ListenerState {
        *lock(&self.state)
    }

    /// Returns the previous state
    fn set_state(&self, next: ListenerState) -> ListenerState {
        let previous = std::mem::replace(&mut *lock(&self.state), next);
        if previous != next {
            info!("Mempool listener: {} → {}", previous, next);
        }
        previous
    }

    fn set_feed(&self, feed: Option<Arc<dyn PendingTxFeed>>) -> Option<Arc<dyn PendingTxFeed>> {
        std::mem::replace(&mut *lock(&self.feed), feed)
    }
}

// ── Listener ────────────────────────────────────────────────────────

pub struct MempoolListener {
    connector: Arc<dyn FeedConnector>,
    registry: Arc<Registry>,
    classifier: Arc<ClassifierConfig>,
    config: ListenerConfig,
    sleeper: Arc<dyn Sleeper>,
    shared: Arc<Shared>,
    cancel: Mutex<CancellationToken>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MempoolListener {
    pub fn new(
        connector: Arc<dyn FeedConnector>,
        registry: Arc<Registry>,
        classifier: ClassifierConfig,
        config: ListenerConfig,
    ) -> Self {
        Self {
            connector,
            registry,
            classifier: Arc::new(classifier),
            config,
            sleeper: Arc::new(TokioSleeper),
            shared: Arc::new(Shared::new()),
            cancel: Mutex::new(CancellationToken::new()),
            task: tokio::sync::Mutex::new(None),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Connect, subscribe and start ingesting. The returned receiver carries
    /// the fatal event if reconnects are later exhausted.
    pub async fn initialize<F>(&self, handler: F) -> Result<mpsc::Receiver<ListenerEvent>, ListenerError>
    where
        F: Fn(ClassifiedTx) + Send + Sync + 'static,
    {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(ListenerError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        *lock(&self.cancel) = cancel.clone();

        self.shared.set_state(ListenerState::Connecting);
        let (feed, stream) = match open_feed(self.connector.as_ref(), &cancel).await {
            Ok(opened) => opened,
            Err(ListenerError::Cancelled) => {
                info!("Mempool listener shut down while connecting");
                self.shared.set_state(ListenerState::Disconnected);
                return Err(ListenerError::Cancelled);
            }
            Err(e) => {
                error!("Mempool listener failed to start: {}", e);
                self.shared.set_state(ListenerState::Disconnected);
                return Err(e);
            }
        };

        self.shared.set_feed(Some(feed.clone()));
        lock(&self.shared.stats).reset_window();
        self.shared.set_state(ListenerState::Subscribed);
        info!(
            "Mempool listener subscribed ({} routers, {} tokens)",
            self.registry.router_count(),
            self.registry.token_count()
        );

        let (events_tx, events_rx) = mpsc::channel(1);
        let worker = Worker {
            connector: self.connector.clone(),
            sleeper: self.sleeper.clone(),
            policy: self.config.reconnect.clone(),
            semaphore: Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1))),
            pipeline: Arc::new(Pipeline {
                registry: self.registry.clone(),
                classifier: self.classifier.clone(),
                handler: Arc::new(handler),
                shared: self.shared.clone(),
                cancel: cancel.clone(),
                fetch_timeout: self.config.fetch_timeout,
            }),
            shared: self.shared.clone(),
            cancel,
        };
        *task = Some(tokio::spawn(worker.run(feed, stream, events_tx)));

        Ok(events_rx)
    }

    /// Cancel in-flight work, unsubscribe, close. Safe to call repeatedly.
    /// Also aborts an `initialize` still waiting on the connect.
    pub async fn shutdown(&self) {
        lock(&self.cancel).cancel();
        let mut task = self.task.lock().await;
        // initialize may have installed a fresh token before we got the lock
        lock(&self.cancel).cancel();

        if let Some(handle) = task.take() {
            if let Err(e) = handle.await {
                error!("Mempool listener task failed: {}", e);
            }
        }

        if let Some(feed) = self.shared.set_feed(None) {
            if let Err(e) = feed.unsubscribe().await {
                debug!("Unsubscribe failed during shutdown: {}", e);
            }
            if let Err(e) = feed.close().await {
                debug!("Close failed during shutdown: {}", e);
            }
        }

        if self.shared.set_state(ListenerState::Disconnected) != ListenerState::Disconnected {
            info!("Mempool listener shut down");
        }
    }

    pub fn get_stats(&self) -> ListenerStats {
        let connected = self.is_connected();
        lock(&self.shared.stats).snapshot(connected)
    }

    pub fn state(&self) -> ListenerState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state() == ListenerState::Subscribed
    }
}

/// Connect and subscribe. A feed that connected but did not end up
/// subscribed (refused or cancelled) is closed before returning.
async fn open_feed(
    connector: &dyn FeedConnector,
    cancel: &CancellationToken,
) -> Result<(Arc<dyn PendingTxFeed>, HashStream), ListenerError> {
    let feed = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ListenerError::Cancelled),
        connected = connector.connect() => connected.map_err(ListenerError::Connect)?,
    };

    let subscribed = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ListenerError::Cancelled),
        subscribed = feed.subscribe_pending_transactions() => subscribed.map_err(ListenerError::Subscribe),
    };

    match subscribed {
        Ok(stream) => Ok((feed, stream)),
        Err(e) => {
            if let Err(close_err) = feed.close().await {
                debug!("Close after failed subscribe: {}", close_err);
            }
            Err(e)
        }
    }
}

// ── Ingestion ───────────────────────────────────────────────────────

enum StreamEnd {
    Cancelled,
    Lost,
}

enum Reconnect {
    Connected(Arc<dyn PendingTxFeed>, HashStream),
    Cancelled,
    Exhausted(ListenerError),
}

struct Worker {
    connector: Arc<dyn FeedConnector>,
    sleeper: Arc<dyn Sleeper>,
    policy: ReconnectPolicy,
    semaphore: Arc<Semaphore>,
    pipeline: Arc<Pipeline>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(
        self,
        mut feed: Arc<dyn PendingTxFeed>,
        mut stream: HashStream,
        events: mpsc::Sender<ListenerEvent>,
    ) {
        let mut tasks = JoinSet::new();

        loop {
            if let StreamEnd::Cancelled = self.ingest(&feed, stream, &mut tasks).await {
                break;
            }

            warn!("Pending transaction stream ended — reconnecting");
            self.shared.set_state(ListenerState::Reconnecting);
            self.shared.set_feed(None);
            if let Err(e) = feed.close().await {
                debug!("Close of dropped feed failed: {}", e);
            }

            match self.reconnect().await {
                Reconnect::Connected(next_feed, next_stream) => {
                    feed = next_feed;
                    stream = next_stream;
                }
                Reconnect::Cancelled => break,
                Reconnect::Exhausted(err) => {
                    if events.try_send(ListenerEvent::Fatal(err)).is_err() {
                        debug!("Fatal event dropped: owner is not listening");
                    }
                    break;
                }
            }
        }

        tasks.shutdown().await;
    }

    async fn ingest(
        &self,
        feed: &Arc<dyn PendingTxFeed>,
        mut stream: HashStream,
        tasks: &mut JoinSet<()>,
    ) -> StreamEnd {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StreamEnd::Cancelled,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Fetch task panicked: {}", e);
                        }
                    }
                }
                next = stream.next() => {
                    let Some(hash) = next else {
                        return StreamEnd::Lost;
                    };
                    lock(&self.shared.stats).total_received += 1;

                    let permit = tokio::select! {
                        _ = self.cancel.cancelled() => return StreamEnd::Cancelled,
                        permit = self.semaphore.clone().acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return StreamEnd::Cancelled,
                        },
                    };

                    let pipeline = self.pipeline.clone();
                    let feed = feed.clone();
                    tasks.spawn(async move {
                        pipeline.process(feed, hash, permit).await;
                    });
                }
            }
        }
    }

    async fn reconnect(&self) -> Reconnect {
        let mut last_error = String::from("subscription stream ended");
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if attempt > self.policy.max_attempts {
                error!(
                    "Mempool listener: {} reconnects exhausted — giving up: {}",
                    self.policy.max_attempts, last_error
                );
                self.shared.set_state(ListenerState::Disconnected);
                return Reconnect::Exhausted(ListenerError::ReconnectsExhausted {
                    attempts: self.policy.max_attempts,
                    last_error,
                });
            }

            lock(&self.shared.stats).reconnect_attempts += 1;
            let delay = self.policy.delay_for(attempt);
            warn!(
                "Mempool reconnect {}/{} in {:?} (last error: {})",
                attempt, self.policy.max_attempts, delay, last_error
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Reconnect::Cancelled,
                _ = self.sleeper.sleep(delay) => {}
            }

            match open_feed(self.connector.as_ref(), &self.cancel).await {
                Ok((feed, stream)) => {
                    self.shared.set_feed(Some(feed.clone()));
                    self.shared.set_state(ListenerState::Subscribed);
                    info!("Mempool listener resubscribed after {} attempt(s)", attempt);
                    return Reconnect::Connected(feed, stream);
                }
                Err(ListenerError::Cancelled) => return Reconnect::Cancelled,
                Err(e) => last_error = e.to_string(),
            }
        }
    }
}

/// Per-hash work: fetch → router filter → decode → classify → handler.
/// The fetch permit covers everything but the handler, so a slow handler
/// never holds back ingestion.
struct Pipeline {
    registry: Arc<Registry>,
    classifier: Arc<ClassifierConfig>,
    handler: SwapHandler,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    fetch_timeout: Duration,
}

impl Pipeline {
    async fn process(&self, feed: Arc<dyn PendingTxFeed>, hash: TxHash, permit: OwnedSemaphorePermit) {
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return,
            fetched = tokio::time::timeout(self.fetch_timeout, feed.get_transaction_by_hash(hash)) => fetched,
        };

        let tx = match fetched {
            Ok(Ok(Some(tx))) => tx,
            Ok(Ok(None)) => {
                debug!("Tx {} no longer pending", hash);
                return;
            }
            Ok(Err(e)) => {
                debug!("Fetch failed for {}: {}", hash, e);
                return;
            }
            Err(_) => {
                debug!("Fetch timed out for {}", hash);
                return;
            }
        };

        match tx.to {
            Some(to) if self.registry.is_monitored_router(to) => {}
            _ => return,
        }

        let Some(decoded) = decode(&tx, &self.registry) else {
            debug!("Router tx {} not decoded (selector {})", hash, selector_hex(&tx.input));
            return;
        };

        let classified = classify(&tx, &decoded, &self.registry, &self.classifier);
        lock(&self.shared.stats).record_decoded();
        drop(permit);

        let handler = &self.handler;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(classified))) {
            error!("Swap handler panicked on {}: {}", hash, panic_message(payload.as_ref()));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
