//! Run-scoped counters
//!
//! Shared between the stream loop and any supervising task (tally reporter)
//! through `Arc`. All updates are relaxed atomics; readers only need
//! eventually consistent totals.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RunCounters {
    processed: AtomicU64,
    violations: AtomicU64,
    decode_errors: AtomicU64,
    store_retries: AtomicU64,
    store_failures: AtomicU64,
    persisted: AtomicU64,
}

/// Point-in-time copy of [`RunCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub processed: u64,
    pub violations: u64,
    pub decode_errors: u64,
    pub store_retries: u64,
    pub store_failures: u64,
    pub persisted: u64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the updated total
    pub fn record_processed(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_violation(&self) -> u64 {
        self.violations.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_retry(&self) {
        self.store_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            violations: self.violations.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            store_retries: self.store_retries.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
        }
    }
}
