//! Detector Core - passage stream to persisted violations
//!
//! ```text
//! MessageSource → decode → classify → encode → RetryingWriter → KvStore
//! ```

pub mod classifier;
pub mod codec;
pub mod counters;
pub mod error_handler;
pub mod memory_store;
pub mod passage;
pub mod retry_writer;
pub mod source;
pub mod sqlite_store;
pub mod store_backend;

mod detector;

pub use classifier::{classify, Violation};
pub use codec::{encode, StorageRecord};
pub use counters::{CounterSnapshot, RunCounters};
pub use detector::{report_tally, DetectorError, MessageOutcome, RunSummary, StopReason, ViolationDetector};
pub use passage::{decode, DecodeError, Passage, TrackPoint};
pub use retry_writer::{RetryingWriter, WriteError};
pub use source::{ChannelSource, JsonlSource, Message, MessageSource, SourceError};
pub use store_backend::{KvStore, StoreError};
