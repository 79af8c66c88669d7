//! Mempool Swap Watcher
//!
//! Main entry point. Subscribes to pending transactions (WS node or the demo
//! feed), logs every decoded router swap and prints listener stats on an
//! interval until Ctrl-C or until reconnects are exhausted.
//!
//! Usage:
//!     swap-watcher                      # WS_URL from .env / environment
//!     swap-watcher --demo               # synthetic feed, no node needed
//!     swap-watcher --config watcher.toml --json-logs

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use swap_watcher::mempool::{
    DemoFeedConnector, FeedConnector, ListenerEvent, ListenerState, ListenerStats, MempoolListener,
    WsFeedConnector,
};
use swap_watcher::{ClassifiedTx, Registry, WatcherConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Mempool Swap Watcher: decodes pending DEX router swaps
#[derive(Parser)]
#[command(name = "swap-watcher")]
struct Args {
    /// TOML config file; environment variables override its values
    #[arg(short, long, env = "WATCHER_CONFIG")]
    config: Option<PathBuf>,

    /// Env file loaded before reading configuration
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Use the synthetic demo feed instead of a node
    #[arg(long)]
    demo: bool,

    /// Emit JSON log lines
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    dotenv::from_filename(&args.env_file).ok();

    let mut config = WatcherConfig::load(args.config.as_deref())?;
    if args.demo {
        config.demo_mode = true;
    }
    config.validate()?;

    info!("Mempool Swap Watcher starting...");
    config.log_summary();

    let registry = match &config.registry_file {
        Some(path) => Registry::load(path)?,
        None => Registry::mainnet(),
    };
    info!(
        "Registry: {} tokens, {} routers",
        registry.token_count(),
        registry.router_count()
    );
    for (address, name) in registry.routers() {
        info!("  Router {} ({:?})", name, address);
    }
    let registry = Arc::new(registry);

    let connector: Arc<dyn FeedConnector> = match (&config.ws_url, config.demo_mode) {
        (_, true) => {
            info!("Demo mode: synthetic pending transactions every {}ms", config.demo_interval_ms);
            Arc::new(DemoFeedConnector::new(&registry, config.demo_interval()))
        }
        (Some(url), false) => Arc::new(WsFeedConnector::new(url.clone())),
        (None, false) => anyhow::bail!("WS_URL not set"),
    };

    let listener = MempoolListener::new(
        connector,
        registry,
        config.classifier_config(),
        config.listener_config(),
    );

    let mut events = listener
        .initialize(log_swap)
        .await
        .context("Failed to start mempool listener")?;

    let mut stats_timer = tokio::time::interval(config.stats_interval());
    stats_timer.tick().await;

    let mut fatal = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received — shutting down");
                break;
            }
            _ = stats_timer.tick() => {
                log_stats("Mempool stats", &listener.get_stats(), listener.state());
            }
            event = events.recv() => match event {
                Some(ListenerEvent::Fatal(e)) => {
                    error!("Mempool listener stopped: {}", e);
                    fatal = Some(e);
                    break;
                }
                None => {
                    warn!("Listener event channel closed");
                    break;
                }
            },
        }
    }

    listener.shutdown().await;
    log_stats("Final stats", &listener.get_stats(), listener.state());

    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn log_swap(swap: ClassifiedTx) {
    if swap.is_suspicious {
        warn!(
            tx = %swap.tx_hash,
            from = %swap.from,
            method = %swap.method,
            "{}",
            swap.summary()
        );
    } else {
        info!(
            tx = %swap.tx_hash,
            from = %swap.from,
            method = %swap.method,
            "{}",
            swap.summary()
        );
    }
}

fn log_stats(label: &str, stats: &ListenerStats, state: ListenerState) {
    info!(
        "{}: state={} received={} decoded={} reconnects={} window={} ({:.1} tx/min since {})",
        label,
        state,
        stats.total_transactions_received,
        stats.total_transactions_decoded,
        stats.reconnect_attempts,
        stats.window_count,
        stats.transactions_per_minute,
        stats.window_start.format("%H:%M:%S")
    );
}
