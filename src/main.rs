//! Engagement Insights Consumer — Binary Entrypoint
//! Tails the producer's JSON-lines file, scores each new message and records
//! the result in SQLite until Ctrl-C.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use engagement_consumer::{
    Consumer, ConsumerConfig, DedupTracker, FailureLimits, InsightSink, LineSource, SqliteSink,
};

/// Compact logs by default; JSON lines when CONSUMER_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("engagement_consumer=info,warn"));

    let json = std::env::var("CONSUMER_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ConsumerConfig::load_default().context("loading consumer config")?;

    info!("=== Engagement Insights Consumer ===");
    info!("Reading from: {}", cfg.data_file.display());
    info!("Storing insights in: {}", cfg.db_file.display());
    info!(
        "Polling every {}s; press Ctrl+C to stop",
        cfg.poll_interval_secs
    );

    let mut sink = SqliteSink::open(&cfg.db_file)?;
    sink.initialize()?;

    let mut consumer = Consumer::new(
        LineSource::new(cfg.data_file.clone()),
        sink,
        DedupTracker::new(),
        cfg.thresholds,
        FailureLimits::from(&cfg),
    );

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Consumer stopped by user");
                let _ = tx.send(true);
            }
            Err(e) => {
                // dropping `tx` would read as a shutdown request
                warn!("listening for Ctrl-C failed: {e}");
                std::future::pending::<()>().await;
            }
        }
    });

    let outcome = consumer.run(cfg.poll_interval(), rx).await;

    match consumer.sink().level_counts() {
        Ok(counts) => info!(
            processed = consumer.dedup().len(),
            ?counts,
            "Consumer shutting down..."
        ),
        Err(e) => warn!("Consumer shutting down; summary unavailable: {e}"),
    }

    outcome.context("consumer terminated")
}
