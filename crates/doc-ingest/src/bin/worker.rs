//! Ingestion worker binary
//!
//! Run with: cargo run -p doc-ingest --bin ingest-worker

use std::sync::Arc;

use doc_ingest::{config::IngestConfig, processing::IngestionWorker, transport::WorkerListener};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = IngestConfig::load()?;
    let worker_config = &config.worker;

    tracing::info!("Configuration loaded");
    tracing::info!(
        "  - Delay window: {}..{}ms",
        worker_config.min_delay_ms,
        worker_config.max_delay_ms
    );
    tracing::info!("  - Success probability: {}", worker_config.success_probability);
    match worker_config.status_ttl_secs {
        Some(ttl) => tracing::info!("  - Status TTL: {}s", ttl),
        None => tracing::info!("  - Status TTL: disabled"),
    }

    let worker = Arc::new(IngestionWorker::new(worker_config)?);
    let sweep = worker.spawn_eviction_sweep();

    let listener = WorkerListener::bind(&worker_config.address(), Arc::clone(&worker)).await?;

    println!("\nWorker listening on {}", listener.local_addr()?);
    println!("Press Ctrl+C to stop\n");

    listener
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    if let Some(sweep) = sweep {
        sweep.abort();
    }
    worker.shutdown();

    Ok(())
}
