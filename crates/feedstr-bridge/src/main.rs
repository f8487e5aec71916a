//! feedstr daemon entry point.
//!
//! Default mode runs the bridge: both batches once at startup, then the two
//! periodic timers, the HTTP API, and the metrics endpoint, until SIGINT or
//! SIGTERM. Subcommands cover one-shot feed management:
//!
//! ```bash
//! # Run the bridge
//! feedstr
//!
//! # Register a feed
//! feedstr add https://example.com/feed.xml
//!
//! # Remove a feed
//! feedstr remove https://example.com/feed.xml
//!
//! # List feeds with their identities
//! feedstr list
//! ```
//!
//! # Graceful Shutdown
//!
//! On SIGINT/SIGTERM the timers stop, any in-flight batch gets a bounded
//! drain, and the feed store handle is released.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use feedstr_bridge::metrics::{init_metrics, start_metrics_server};
use feedstr_bridge::{
    routes, AppState, BatchKind, Config, ContentPipeline, FeedFetcher, FeedStore, JobTable,
    NostrTransport, Publisher, Registrar, Scheduler,
};
use feedstr_core::DateFormats;

/// How long shutdown waits for an in-flight batch before giving up.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// RSS/Atom to Nostr bridge.
#[derive(Parser, Debug)]
#[command(name = "feedstr")]
#[command(about = "RSS/Atom to Nostr bridge", long_about = None)]
#[command(version)]
struct Args {
    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new feed URL.
    Add { url: String },
    /// Remove a registered feed.
    Remove { url: String },
    /// List registered feeds with their identities.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap())
                .add_directive("feedstr_bridge=debug".parse().unwrap()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    // The record store is the only fatal startup dependency.
    let store = Arc::new(
        FeedStore::open(&config.db_path)
            .with_context(|| format!("failed to open feed store at {:?}", config.db_path))?,
    );

    let fetcher = Arc::new(FeedFetcher::new(config.fetch_timeout)?);
    let transport = Arc::new(NostrTransport::connect(&config.relays).await);
    let publisher = Arc::new(Publisher::new(
        config.relays.clone(),
        config.publish_timeout,
        config.dry_run,
        transport,
    ));
    let pipeline = Arc::new(ContentPipeline::new(DateFormats::new(
        config.date_formats.clone(),
    )));
    let registrar = Arc::new(Registrar::new(
        store.clone(),
        fetcher.clone(),
        publisher.clone(),
        pipeline.clone(),
        config.nip05_domain.clone(),
        config.default_feed_image.clone(),
        config.history_window,
    ));

    match args.command {
        Some(Command::Add { url }) => {
            let (record, npub) = registrar.add_feed(&url).await?;
            println!("{npub} {}", record.url);
        }
        Some(Command::Remove { url }) => {
            registrar.remove_feed(&url)?;
        }
        Some(Command::List) => {
            for record in registrar.list_feeds()? {
                let npub = feedstr_core::npub_from_hex(&record.public_key).unwrap_or_default();
                let health = record.health;
                if health.state == feedstr_bridge::FeedState::Active {
                    println!("{npub} {}", record.url);
                } else {
                    println!(
                        "{npub} {} [{}, failures: {}]",
                        record.url,
                        health.state.as_str(),
                        health.failure_count
                    );
                }
            }
        }
        None => {
            run_daemon(config, store, fetcher, publisher, pipeline, registrar).await?;
        }
    }

    Ok(())
}

async fn run_daemon(
    config: Arc<Config>,
    store: Arc<FeedStore>,
    fetcher: Arc<FeedFetcher>,
    publisher: Arc<Publisher>,
    pipeline: Arc<ContentPipeline>,
    registrar: Arc<Registrar>,
) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting feedstr");

    if config.metrics_port > 0 {
        let handle = init_metrics();
        start_metrics_server(config.metrics_port, handle).await?;
    }

    // HTTP API.
    let jobs = JobTable::new(config.max_concurrent_jobs, config.job_retention);
    let state = AppState::new(store.clone(), jobs, registrar.clone(), config.clone());
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "API server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "API server exited");
        }
    });

    let scheduler = Arc::new(Scheduler::new(
        store,
        fetcher,
        publisher,
        pipeline,
        registrar,
        config.clone(),
    ));

    // First run of both batches, before the timers are armed.
    if let Err(e) = scheduler.run_batch(BatchKind::Metadata).await {
        tracing::error!(error = %e, "initial metadata batch failed");
    }
    if let Err(e) = scheduler.run_batch(BatchKind::Scrape).await {
        tracing::error!(error = %e, "initial scrape batch failed");
    }

    let start = tokio::time::Instant::now();
    let mut metadata_ticker =
        tokio::time::interval_at(start + config.metadata_interval, config.metadata_interval);
    let mut scrape_ticker =
        tokio::time::interval_at(start + config.fetch_interval, config.fetch_interval);
    metadata_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    scrape_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = metadata_ticker.tick() => {
                if let Err(e) = scheduler.run_batch(BatchKind::Metadata).await {
                    tracing::error!(error = %e, "metadata batch failed");
                }
            }
            _ = scrape_ticker.tick() => {
                if let Err(e) = scheduler.run_batch(BatchKind::Scrape).await {
                    tracing::error!(error = %e, "scrape batch failed");
                }
            }
            _ = shutdown_signal() => {
                break;
            }
        }
    }

    tracing::info!("shutdown signal received, draining");
    if !scheduler.drain(DRAIN_TIMEOUT).await {
        tracing::warn!(timeout = ?DRAIN_TIMEOUT, "batch still running after drain timeout");
    }
    tracing::info!("closing feed store");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
