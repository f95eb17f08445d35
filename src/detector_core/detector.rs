//! Stream loop: subscription → decode → classify → encode → retrying write
//!
//! Single consumer. Cancellation and the message cap are only checked
//! between messages, so a violation that is being written is always either
//! persisted or given up on by the retrying writer before the loop exits.

use crate::config::DetectorConfig;
use crate::detector_core::{
    classifier::classify,
    codec::encode,
    counters::{CounterSnapshot, RunCounters},
    passage::decode,
    retry_writer::{RetryingWriter, WriteError},
    source::{Message, MessageSource, SourceError},
    store_backend::KvStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    SourceClosed,
    CapReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Payload failed to decode
    Malformed,
    /// Decoded, no violation
    Clean,
    /// Violation written to the store
    Persisted,
    /// Violation detected but no storage record could be built
    Unencodable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    pub counters: CounterSnapshot,
}

#[derive(Debug)]
pub enum DetectorError {
    Subscribe(SourceError),
}

impl std::fmt::Display for DetectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorError::Subscribe(e) => write!(f, "Subscription error: {}", e),
        }
    }
}

impl std::error::Error for DetectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DetectorError::Subscribe(e) => Some(e),
        }
    }
}

pub struct ViolationDetector {
    source: Box<dyn MessageSource>,
    writer: RetryingWriter,
    counters: Arc<RunCounters>,
    max_messages: Option<u64>,
    max_retries: u32,
}

impl ViolationDetector {
    /// `store` must already be connected
    pub fn new(
        source: Box<dyn MessageSource>,
        store: Box<dyn KvStore>,
        max_messages: Option<u64>,
        max_retries: u32,
    ) -> Self {
        let counters = Arc::new(RunCounters::new());
        Self {
            source,
            writer: RetryingWriter::new(store, counters.clone()),
            counters,
            max_messages,
            max_retries,
        }
    }

    pub fn from_config(
        source: Box<dyn MessageSource>,
        store: Box<dyn KvStore>,
        config: &DetectorConfig,
    ) -> Self {
        Self::new(source, store, config.max_messages, config.max_retries)
    }

    /// Shared handle for supervising tasks
    pub fn counters(&self) -> Arc<RunCounters> {
        self.counters.clone()
    }

    pub async fn run(&mut self, cancel: CancellationToken) -> Result<RunSummary, DetectorError> {
        let mut rx = self
            .source
            .subscribe()
            .await
            .map_err(DetectorError::Subscribe)?;

        log::info!("🚀 Detector started, waiting for messages...");
        log::info!("   ├─ Store: {}", self.writer.backend_type());
        log::info!("   ├─ Max retries: {}", self.max_retries);
        match self.max_messages {
            Some(cap) => log::info!("   └─ Message cap: {}", cap),
            None => log::info!("   └─ Message cap: none"),
        }

        let stop_reason = loop {
            let msg = tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                msg = rx.recv() => msg,
            };

            let Some(msg) = msg else {
                break StopReason::SourceClosed;
            };

            if let Err(e) = self.handle_message(&msg).await {
                // Store failures cost this violation only, never the stream
                log::error!("❌ Violation dropped: {}", e);
            }

            if let Some(cap) = self.max_messages {
                if self.counters.processed() >= cap {
                    log::info!("🏁 Message cap {} reached, draining", cap);
                    break StopReason::CapReached;
                }
            }
        };

        if let Err(e) = self.writer.close().await {
            log::warn!("⚠️  Failed to close store: {}", e);
        }

        let counters = self.counters.snapshot();
        log::info!(
            "🛑 Detector stopped ({:?}): processed {} messages, found {} violations",
            stop_reason,
            counters.processed,
            counters.violations
        );

        Ok(RunSummary {
            stop_reason,
            counters,
        })
    }

    /// Process a single message
    ///
    /// Decode and classify outcomes are contained here; a failed store write
    /// is handed back so the caller decides what it costs.
    pub async fn handle_message(&mut self, msg: &Message) -> Result<MessageOutcome, WriteError> {
        let n = self.counters.record_processed();

        let passage = match decode(msg.bytes()) {
            Ok(passage) => passage,
            Err(e) => {
                self.counters.record_decode_error();
                log::warn!("Message {} skipped: {}", n, e);
                return Ok(MessageOutcome::Malformed);
            }
        };

        let Some(violation) = classify(&passage, &self.counters) else {
            log::debug!("Message {} processed, no violation ({})", n, passage.license_num);
            return Ok(MessageOutcome::Clean);
        };

        log::info!(
            "🚨 Message {}: violation by {} at t={}",
            n,
            violation.license,
            violation.point.t
        );

        let record = match encode(&violation) {
            Ok(record) => record,
            Err(e) => {
                log::error!("❌ Message {}: cannot encode violation: {}", n, e);
                return Ok(MessageOutcome::Unencodable);
            }
        };

        self.writer.write(&record, self.max_retries).await?;
        Ok(MessageOutcome::Persisted)
    }
}

/// Log the running processed/violations tally until cancelled
pub async fn report_tally(counters: Arc<RunCounters>, every: Duration, cancel: CancellationToken) {
    let mut timer = interval(every);
    // First tick completes immediately
    timer.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {
                let s = counters.snapshot();
                log::info!(
                    "📊 Tally: processed={} violations={} persisted={} malformed={} retries={} write_failures={}",
                    s.processed,
                    s.violations,
                    s.persisted,
                    s.decode_errors,
                    s.store_retries,
                    s.store_failures
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector_core::memory_store::MemoryStore;
    use crate::detector_core::source::ChannelSource;
    use tokio::sync::mpsc;

    async fn detector() -> ViolationDetector {
        let (_tx, rx) = mpsc::channel(1);
        let mut store = MemoryStore::new();
        store.connect("").await.unwrap();
        ViolationDetector::new(Box::new(ChannelSource::new(rx)), Box::new(store), None, 3)
    }

    #[tokio::test]
    async fn test_handle_message_outcomes() {
        let mut detector = detector().await;

        let malformed = Message::new("{not json");
        let clean = Message::new(r#"{"licenseNum":"A1","track":[{"t":1700000000,"x":0,"y":0}]}"#);
        let empty = Message::new(r#"{"licenseNum":"A1","track":[]}"#);
        let hit = Message::new(r#"{"licenseNum":"A1","track":[{"t":1700000025,"x":0,"y":0}]}"#);

        assert_eq!(detector.handle_message(&malformed).await.unwrap(), MessageOutcome::Malformed);
        assert_eq!(detector.handle_message(&clean).await.unwrap(), MessageOutcome::Clean);
        assert_eq!(detector.handle_message(&empty).await.unwrap(), MessageOutcome::Clean);
        assert_eq!(detector.handle_message(&hit).await.unwrap(), MessageOutcome::Persisted);

        let snap = detector.counters().snapshot();
        assert_eq!(snap.processed, 4);
        assert_eq!(snap.violations, 1);
        assert_eq!(snap.decode_errors, 1);
        assert_eq!(snap.persisted, 1);
    }

    #[tokio::test]
    async fn test_handle_message_returns_store_error() {
        let (_tx, rx) = mpsc::channel(1);
        // Never connected: every insert is a permanent NotConnected error
        let mut detector = ViolationDetector::new(
            Box::new(ChannelSource::new(rx)),
            Box::new(MemoryStore::new()),
            None,
            3,
        );
        let hit = Message::new(r#"{"licenseNum":"A1","track":[{"t":1700000025}]}"#);

        let err = detector.handle_message(&hit).await.unwrap_err();

        assert!(matches!(
            err,
            WriteError::Permanent { attempts: 1, source: crate::detector_core::StoreError::NotConnected, .. }
        ));
        assert_eq!(err.key(), "A1_2023-11-14_22:13:45");
        let snap = detector.counters().snapshot();
        assert_eq!(snap.violations, 1);
        assert_eq!(snap.store_failures, 1);
    }

    #[tokio::test]
    async fn test_subscription_failure_aborts() {
        let mut detector = detector().await;
        // First run consumes the subscription
        let cancel = CancellationToken::new();
        cancel.cancel();
        detector.run(cancel.clone()).await.unwrap();

        let err = detector.run(cancel).await.unwrap_err();
        assert!(matches!(err, DetectorError::Subscribe(SourceError::AlreadySubscribed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_tally_stops_on_cancel() {
        let counters = Arc::new(RunCounters::new());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(report_tally(counters, Duration::from_secs(1), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();

        handle.await.unwrap();
    }
}
