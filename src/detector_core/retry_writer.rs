//! Retrying writer around a [`KvStore`]
//!
//! Transient store errors are retried with tiered backoff; anything else
//! fails fast. Every retry and every terminal failure is logged and counted
//! so degraded store health shows up in the run tally.

use crate::detector_core::{
    codec::StorageRecord,
    counters::RunCounters,
    error_handler::{RetryBackoff, RETRY_STEP},
    store_backend::{KvStore, StoreError},
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub enum WriteError {
    /// Non-retryable store error
    Permanent {
        key: String,
        attempts: u32,
        source: StoreError,
    },
    /// Every attempt failed with a transient error
    ExhaustedRetries {
        key: String,
        attempts: u32,
        last_error: StoreError,
    },
}

impl WriteError {
    pub fn key(&self) -> &str {
        match self {
            WriteError::Permanent { key, .. } | WriteError::ExhaustedRetries { key, .. } => key,
        }
    }
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Permanent { key, attempts, source } => {
                write!(f, "Insert of {} failed on attempt {}: {}", key, attempts, source)
            }
            WriteError::ExhaustedRetries { key, attempts, last_error } => write!(
                f,
                "Insert of {} failed after {} attempts: {}",
                key, attempts, last_error
            ),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Permanent { source, .. } => Some(source),
            WriteError::ExhaustedRetries { last_error, .. } => Some(last_error),
        }
    }
}

pub struct RetryingWriter {
    store: Box<dyn KvStore>,
    counters: Arc<RunCounters>,
    step: Duration,
}

impl RetryingWriter {
    pub fn new(store: Box<dyn KvStore>, counters: Arc<RunCounters>) -> Self {
        Self {
            store,
            counters,
            step: RETRY_STEP,
        }
    }

    pub fn backend_type(&self) -> &'static str {
        self.store.backend_type()
    }

    /// Persist `record`, making at most `max_retries` attempts (minimum one)
    ///
    /// Returns the number of attempts used on success.
    pub async fn write(&mut self, record: &StorageRecord, max_retries: u32) -> Result<u32, WriteError> {
        let mut backoff = RetryBackoff::new(self.step, max_retries);

        loop {
            let attempt = backoff.begin_attempt();

            let err = match self.store.insert(&record.key, &record.value).await {
                Ok(_) => {
                    self.counters.record_persisted();
                    log::debug!("✅ Stored {} (attempt {})", record.key, attempt);
                    return Ok(attempt);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                self.counters.record_store_failure();
                log::error!("❌ Permanent store error for {}: {}", record.key, err);
                return Err(WriteError::Permanent {
                    key: record.key.clone(),
                    attempts: attempt,
                    source: err,
                });
            }

            log::warn!(
                "⚠️  Transient store error for {} (attempt {}/{}): {}",
                record.key,
                attempt,
                backoff.max_attempts(),
                err
            );

            if backoff.sleep().await.is_err() {
                self.counters.record_store_failure();
                log::error!(
                    "❌ Failed to save violation after {} attempts: {}",
                    attempt,
                    record.key
                );
                return Err(WriteError::ExhaustedRetries {
                    key: record.key.clone(),
                    attempts: attempt,
                    last_error: err,
                });
            }

            self.counters.record_store_retry();
        }
    }

    pub async fn close(&mut self) -> Result<(), StoreError> {
        self.store.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Fails the first `failures` inserts, transiently unless `permanent`
    struct FlakyStore {
        failures: u32,
        permanent: bool,
        attempts: Arc<Mutex<Vec<Instant>>>,
    }

    #[async_trait]
    impl KvStore for FlakyStore {
        async fn connect(&mut self, _conn: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn insert(&mut self, _key: &str, _value: &[u8]) -> Result<u64, StoreError> {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(Instant::now());
            if attempts.len() as u32 <= self.failures {
                if self.permanent {
                    return Err(StoreError::Rejected("bad value".to_string()));
                }
                return Err(StoreError::Internal("busy".to_string()));
            }
            Ok(1)
        }

        async fn close(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        fn backend_type(&self) -> &'static str {
            "Flaky"
        }
    }

    fn flaky_writer(failures: u32, permanent: bool) -> (RetryingWriter, Arc<Mutex<Vec<Instant>>>, Arc<RunCounters>) {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let counters = Arc::new(RunCounters::new());
        let store = FlakyStore {
            failures,
            permanent,
            attempts: attempts.clone(),
        };
        (RetryingWriter::new(Box::new(store), counters.clone()), attempts, counters)
    }

    fn record() -> StorageRecord {
        StorageRecord {
            key: "AB123_2023-11-14_22:13:45".to_string(),
            value: br#"{"license":"AB123","time":1700000025}"#.to_vec(),
        }
    }

    fn assert_gaps(attempts: &[Instant], expected_ms: &[u64]) {
        assert_eq!(attempts.len(), expected_ms.len() + 1);
        for (pair, ms) in attempts.windows(2).zip(expected_ms) {
            let gap = pair[1] - pair[0];
            let expected = Duration::from_millis(*ms);
            assert!(
                gap >= expected && gap < expected + Duration::from_millis(5),
                "gap {:?}, expected {:?}",
                gap,
                expected
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        // k = 3 failures, max_retries = k + 1
        let (mut writer, attempts, counters) = flaky_writer(3, false);

        let used = writer.write(&record(), 4).await.unwrap();

        assert_eq!(used, 4);
        let attempts = attempts.lock().unwrap();
        assert_gaps(&attempts, &[200, 400, 600]);
        assert_eq!(counters.snapshot().store_retries, 3);
        assert_eq!(counters.snapshot().persisted, 1);
        assert_eq!(counters.snapshot().store_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_retry_budget() {
        // k = 3 failures, max_retries = k
        let (mut writer, attempts, counters) = flaky_writer(3, false);

        let err = writer.write(&record(), 3).await.unwrap_err();

        assert!(matches!(err, WriteError::ExhaustedRetries { attempts: 3, .. }));
        assert_eq!(err.key(), "AB123_2023-11-14_22:13:45");
        // No delay after the final attempt
        let attempts = attempts.lock().unwrap();
        assert_gaps(&attempts, &[200, 400]);
        assert_eq!(counters.snapshot().store_failures, 1);
        assert_eq!(counters.snapshot().persisted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_fails_fast() {
        let (mut writer, attempts, counters) = flaky_writer(1, true);

        let err = writer.write(&record(), 10).await.unwrap_err();

        assert!(matches!(err, WriteError::Permanent { attempts: 1, .. }));
        assert_eq!(attempts.lock().unwrap().len(), 1);
        assert_eq!(counters.snapshot().store_retries, 0);
        assert_eq!(counters.snapshot().store_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_single_attempt() {
        let (mut writer, attempts, _) = flaky_writer(0, false);
        assert_eq!(writer.write(&record(), 0).await.unwrap(), 1);
        assert_eq!(attempts.lock().unwrap().len(), 1);

        let (mut writer, attempts, _) = flaky_writer(1, false);
        let err = writer.write(&record(), 0).await.unwrap_err();
        assert!(matches!(err, WriteError::ExhaustedRetries { attempts: 1, .. }));
        assert_eq!(attempts.lock().unwrap().len(), 1);
    }
}
