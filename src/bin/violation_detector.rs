//! Violation detector runtime
//!
//! Reads passages (one JSON object per line) from `INPUT_PATH` or stdin,
//! flags red-light violations and persists them to the configured store.
//! Stops on SIGINT/SIGTERM, when the input ends, or at the message cap.
//!
//! Usage:
//!   cargo run --release --bin violation_detector < passages.jsonl
//!
//! Environment variables:
//!   MAX_MESSAGES - Stop after N messages, 0 = unbounded (default: 200)
//!   MAX_RETRIES - Store write attempts per violation (default: 3)
//!   STORE_BACKEND - sqlite | memory (default: sqlite)
//!   STORE_PATH - SQLite database path (default: data/violations.db)
//!   INPUT_PATH - JSONL input file (default: stdin)
//!   TALLY_INTERVAL_SECS - Tally log interval (default: 10)
//!   RUST_LOG - Log filter (default: info)

use dotenv::dotenv;
use log::{error, info, warn};
use redlight::config::{BackendType, DetectorConfig};
use redlight::detector_core::{
    memory_store::MemoryStore, report_tally, sqlite_store::SqliteStore, JsonlSource, KvStore,
    MessageSource, ViolationDetector,
};
use tokio_util::sync::CancellationToken;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = DetectorConfig::from_env()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(config));

    // The stdin reader can still be parked in a blocking read; don't wait on it
    runtime.shutdown_background();

    result
}

async fn run(config: DetectorConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("🚦 Violation detector");
    info!("   ├─ Backend: {:?}", config.backend);
    info!("   ├─ Store path: {}", config.store_path);
    info!(
        "   └─ Input: {}",
        config.input_path.as_deref().unwrap_or("stdin")
    );

    let mut store: Box<dyn KvStore> = match config.backend {
        BackendType::Sqlite => Box::new(SqliteStore::new()),
        BackendType::Memory => Box::new(MemoryStore::new()),
    };
    store.connect(&config.store_path).await?;

    let source: Box<dyn MessageSource> = match &config.input_path {
        Some(path) => Box::new(JsonlSource::<tokio::fs::File>::open(path).await?),
        None => Box::new(JsonlSource::<tokio::io::Stdin>::stdin()),
    };

    let mut detector = ViolationDetector::from_config(source, store, &config);
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down...");
        shutdown.cancel();
    });

    let tally = tokio::spawn(report_tally(
        detector.counters(),
        config.tally_interval,
        cancel.child_token(),
    ));

    let result = detector.run(cancel.clone()).await;
    cancel.cancel();
    let _ = tally.await;

    match result {
        Ok(summary) => {
            info!(
                "✅ Detector stopped: {} processed, {} violations, {} persisted",
                summary.counters.processed,
                summary.counters.violations,
                summary.counters.persisted
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Service error: {}", e);
            Err(e.into())
        }
    }
}

/// Resolves on the first SIGINT or SIGTERM
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("⚠️  SIGTERM handler unavailable: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C");
    }
}
